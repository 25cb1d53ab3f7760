//! Codebase-relative paths.
//!
//! `RepoPath` always uses forward slashes, regardless of host platform,
//! so that cache keys derived from it are stable across a codebase
//! rename and across Windows/Unix. It is a thin newtype rather than a
//! bare `String` so a host-separator path can never cross the
//! `monitor-fs` boundary by accident.

use std::fmt;
use std::path::Path;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RepoPath(String);

impl RepoPath {
    /// Build a `RepoPath` from a path relative to the codebase root.
    /// Rejects `..` components and absolute paths.
    pub fn new(relative: impl AsRef<Path>) -> Result<Self, CoreError> {
        let relative = relative.as_ref();
        let mut parts = Vec::new();
        for component in relative.components() {
            use std::path::Component::*;
            match component {
                Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| CoreError::NonUtf8Path(relative.display().to_string()))?;
                    parts.push(part.to_string());
                }
                CurDir => {}
                ParentDir | RootDir | Prefix(_) => {
                    return Err(CoreError::PathEscapesRoot(relative.display().to_string()));
                }
            }
        }
        Ok(Self(parts.join("/")))
    }

    /// The raw forward-slash-separated string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension (without the dot), lowercased, if any.
    pub fn extension(&self) -> Option<String> {
        self.0.rsplit('/').next()?.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
    }

    /// The final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Directory portion (everything before the final `/`), or empty string at root.
    pub fn dir(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        }
    }

    /// Resolve against a filesystem root to produce an absolute path.
    pub fn resolve(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_forward_slashes() {
        let p = RepoPath::new("src/main.rs").unwrap();
        assert_eq!(p.as_str(), "src/main.rs");
    }

    #[test]
    fn rejects_parent_dir_escape() {
        assert!(RepoPath::new("../secret").is_err());
    }

    #[test]
    fn extension_is_lowercased() {
        let p = RepoPath::new("src/Main.RS").unwrap();
        assert_eq!(p.extension().as_deref(), Some("rs"));
    }

    #[test]
    fn dir_and_file_name() {
        let p = RepoPath::new("a/b/c.py").unwrap();
        assert_eq!(p.dir(), "a/b");
        assert_eq!(p.file_name(), "c.py");
        let root = RepoPath::new("c.py").unwrap();
        assert_eq!(root.dir(), "");
    }
}
