use std::fs::Metadata;
use std::path::Path;

use monitor_core::snapshot::{ContentDigest, FileSnapshot};

/// Hashes file content for the cache's `(path, tool, content-digest)`
/// key. Kept separate from the stat fields proper: a failed read (file
/// vanished between `stat` and here, a special device, a permission
/// race) degrades to `None` rather than failing the whole snapshot.
fn content_digest(path: &Path) -> Option<ContentDigest> {
    std::fs::read(path).ok().map(|bytes| ContentDigest::of(&bytes))
}

#[cfg(unix)]
pub fn snapshot_from_metadata(path: &Path, metadata: &Metadata) -> FileSnapshot {
    use std::os::unix::fs::MetadataExt;
    FileSnapshot {
        size: metadata.size(),
        mtime_ns: metadata.mtime() as i128 * 1_000_000_000 + metadata.mtime_nsec() as i128,
        mode: metadata.mode(),
        ino: metadata.ino(),
        mountdev: metadata.dev(),
        content_digest: content_digest(path),
    }
}

#[cfg(not(unix))]
pub fn snapshot_from_metadata(path: &Path, metadata: &Metadata) -> FileSnapshot {
    use std::time::UNIX_EPOCH;
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0);
    FileSnapshot { size: metadata.len(), mtime_ns, mode: 0, ino: 0, mountdev: 0, content_digest: content_digest(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hashes_real_file_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let metadata = std::fs::symlink_metadata(&path).unwrap();
        let snapshot = snapshot_from_metadata(&path, &metadata);
        assert_eq!(snapshot.content_digest, Some(ContentDigest::of(b"hello")));
    }

    #[test]
    fn missing_file_degrades_to_no_digest_rather_than_panicking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"x").unwrap();
        let metadata = std::fs::symlink_metadata(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let snapshot = snapshot_from_metadata(&path, &metadata);
        assert_eq!(snapshot.content_digest, None);
    }
}
