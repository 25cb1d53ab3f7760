//! File classification: extension table, then shebang, then a content
//! sniff via the system `file` utility as a last resort.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Command;

fn by_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "sh" | "bash" | "zsh" => "shell",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "rb" => "ruby",
        "go" => "go",
        "md" | "markdown" => "markdown",
        "toml" => "toml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "html" | "htm" => "html",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" | "cxx" => "cpp",
        _ => return None,
    })
}

fn by_shebang(path: &Path) -> Option<&'static str> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader.read_line(&mut first_line).ok()?;
    if !first_line.starts_with("#!") {
        return None;
    }
    let line = first_line.to_lowercase();
    if line.contains("python") {
        Some("python")
    } else if line.contains("bash") || line.contains("/sh") || line.ends_with("sh\n") {
        Some("shell")
    } else if line.contains("node") {
        Some("javascript")
    } else if line.contains("ruby") {
        Some("ruby")
    } else {
        None
    }
}

/// Shell out to the system `file` utility as a last-resort content
/// sniff. Returns `None` if `file` isn't installed or its output is not
/// recognized — callers treat that as "unknown", never an error.
fn by_content_sniff(path: &Path) -> Option<&'static str> {
    let output = Command::new("file").arg("--brief").arg("--mime-type").arg(path).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let mime = String::from_utf8_lossy(&output.stdout);
    let mime = mime.trim();
    Some(match mime {
        "text/x-python" | "text/x-script.python" => "python",
        "text/x-shellscript" => "shell",
        "text/x-ruby" => "ruby",
        m if m.starts_with("text/") => "text",
        _ => return None,
    })
}

/// Classify a file's language/kind: extension table, then shebang
/// parsing, then a `file`-utility content sniff, else `"unknown"`.
pub fn classify(path: &Path) -> String {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(class) = by_extension(&ext.to_lowercase()) {
            return class.to_string();
        }
    }
    if let Some(class) = by_shebang(path) {
        return class.to_string();
    }
    by_content_sniff(path).unwrap_or("unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn classifies_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, b"print(1)").unwrap();
        assert_eq!(classify(&path), "python");
    }

    #[test]
    fn classifies_extensionless_shebang_script() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"#!/usr/bin/env python3\nprint(1)\n").unwrap();
        assert_eq!(classify(&path), "python");
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.xyz123");
        std::fs::write(&path, b"\x00\x01binary").unwrap();
        let class = classify(&path);
        assert!(class == "unknown" || class == "text");
    }
}
