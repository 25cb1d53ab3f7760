//! Initial recursive walk of the codebase root.
//!
//! Gitignore matching is delegated to the `ignore` crate, same as the
//! non-recursive part of any real walk. Directory symlinks are followed
//! manually, one level at a time, so we can refuse to leave the
//! codebase root and can break cycles with an inode-seen set — the
//! `ignore` crate's own `follow_links` does both of these already, but
//! more conservatively than spec'd (it also refuses symlinks that
//! revisit an ancestor, which is narrower than "anywhere already
//! visited").

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use monitor_core::path::RepoPath;
use monitor_core::snapshot::FileSnapshot;

use crate::error::FsError;
use crate::stat::snapshot_from_metadata;

/// Walk `root`, skipping `.{appname}` and anything gitignored, following
/// directory symlinks that resolve back inside `root` and breaking
/// cycles by `(dev, ino)`.
pub fn initial_scan(root: &Path, cache_dir_name: &str) -> Result<Vec<(RepoPath, FileSnapshot)>, FsError> {
    let root = fs::canonicalize(root)?;
    let mut seen_dirs: HashSet<(u64, u64)> = HashSet::new();
    let mut out = Vec::new();
    walk_into(&root, &root, cache_dir_name, &mut seen_dirs, &mut out)?;
    Ok(out)
}

fn walk_into(
    base: &Path,
    root: &Path,
    cache_dir_name: &str,
    seen_dirs: &mut HashSet<(u64, u64)>,
    out: &mut Vec<(RepoPath, FileSnapshot)>,
) -> Result<(), FsError> {
    let walker = WalkBuilder::new(base)
        .hidden(false)
        .follow_links(false)
        .filter_entry({
            let cache_dir_name = cache_dir_name.to_string();
            move |entry| entry.file_name() != cache_dir_name.as_str()
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable directory entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        if path == base {
            continue;
        }
        let Ok(metadata) = fs::symlink_metadata(path) else { continue };

        if metadata.file_type().is_symlink() {
            let Ok(target) = fs::canonicalize(path) else { continue };
            if !target.starts_with(root) {
                continue; // refuses to leave the codebase root
            }
            let Ok(target_meta) = fs::metadata(&target) else { continue };
            if target_meta.is_dir() {
                let key = dir_identity(&target_meta);
                if !seen_dirs.insert(key) {
                    continue; // cycle
                }
                walk_into(&target, root, cache_dir_name, seen_dirs, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                if let Ok(repo_path) = RepoPath::new(rel) {
                    out.push((repo_path, snapshot_from_metadata(&target, &target_meta)));
                }
            }
            continue;
        }

        if metadata.is_dir() {
            continue; // directories themselves produce no row; their files do
        }

        let Ok(rel) = path.strip_prefix(root) else { continue };
        let Ok(repo_path) = RepoPath::new(rel) else { continue };
        out.push((repo_path, snapshot_from_metadata(path, &metadata)));
    }
    Ok(())
}

#[cfg(unix)]
fn dir_identity(metadata: &fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn dir_identity(metadata: &fs::Metadata) -> (u64, u64) {
    (0, metadata.len())
}

/// Used by `FsSynchronizer::new` to decide whether a freshly observed
/// path belongs under the cache directory and should be ignored.
pub fn is_under_cache_dir(rel: &Path, cache_dir_name: &str) -> bool {
    rel.components().next().map(|c| c.as_os_str() == cache_dir_name).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn scans_plain_files_and_skips_cache_dir() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".monitor")).unwrap();
        fs::write(dir.path().join(".monitor").join("status.db"), b"x").unwrap();
        let mut f = fs::File::create(dir.path().join("a.py")).unwrap();
        f.write_all(b"print(1)").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.py"), b"print(2)").unwrap();

        let rows = initial_scan(dir.path(), ".monitor").unwrap();
        let paths: HashSet<String> = rows.iter().map(|(p, _)| p.as_str().to_string()).collect();
        assert!(paths.contains("a.py"));
        assert!(paths.contains("sub/b.py"));
        assert!(!paths.iter().any(|p| p.starts_with(".monitor")));
    }

    #[test]
    fn follows_in_tree_directory_symlink() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real").join("c.py"), b"print(3)").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        #[cfg(unix)]
        {
            let rows = initial_scan(dir.path(), ".monitor").unwrap();
            let paths: HashSet<String> = rows.iter().map(|(p, _)| p.as_str().to_string()).collect();
            assert!(paths.contains("link/c.py"));
        }
    }

    #[test]
    fn is_under_cache_dir_matches_top_level_only() {
        assert!(is_under_cache_dir(Path::new(".monitor/status.db"), ".monitor"));
        assert!(!is_under_cache_dir(Path::new("src/.monitor/x"), ".monitor"));
    }
}
