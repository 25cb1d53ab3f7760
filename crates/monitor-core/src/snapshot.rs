//! Filesystem snapshots and the keys derived from them.

use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 content digest, computed lazily (only when a tool's
/// classification actually requires content sniffing, per spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// `{path, size, mtime_ns, mode, ino, mountdev, content_digest_opt}`.
///
/// Two snapshots of the same path are equivalent iff size, mtime_ns,
/// mode, ino, and mountdev all compare equal (`content_digest` is
/// excluded from equivalence — it is auxiliary, lazily-computed data,
/// not part of the identity of the observation).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileSnapshot {
    pub size: u64,
    pub mtime_ns: i128,
    pub mode: u32,
    pub ino: u64,
    pub mountdev: u64,
    pub content_digest: Option<ContentDigest>,
}

impl FileSnapshot {
    /// Two snapshots observed the same file state, independent of the
    /// (possibly absent) content digest.
    pub fn stat_eq(&self, other: &FileSnapshot) -> bool {
        self.size == other.size
            && self.mtime_ns == other.mtime_ns
            && self.mode == other.mode
            && self.ino == other.ino
            && self.mountdev == other.mountdev
    }
}

/// Identifies the inputs of a `Result`: the stat tuple plus a tool
/// version tag, so upgrading a tool invalidates stale cached results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SnapshotKey {
    pub size: u64,
    pub mtime_ns: i128,
    pub mode: u32,
    pub ino: u64,
    pub mountdev: u64,
    pub tool_version_tag: u32,
}

impl SnapshotKey {
    pub fn from_snapshot(snapshot: &FileSnapshot, tool_version_tag: u32) -> Self {
        Self {
            size: snapshot.size,
            mtime_ns: snapshot.mtime_ns,
            mode: snapshot.mode,
            ino: snapshot.ino,
            mountdev: snapshot.mountdev,
            tool_version_tag,
        }
    }

    /// Whether this key still describes the current observed snapshot
    /// (ignoring the tool version tag, which the caller already knows).
    pub fn matches_snapshot(&self, snapshot: &FileSnapshot) -> bool {
        self.size == snapshot.size
            && self.mtime_ns == snapshot.mtime_ns
            && self.mode == snapshot.mode
            && self.ino == snapshot.ino
            && self.mountdev == snapshot.mountdev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(mtime: i128) -> FileSnapshot {
        FileSnapshot { size: 10, mtime_ns: mtime, mode: 0o644, ino: 1, mountdev: 1, content_digest: None }
    }

    #[test]
    fn stat_eq_ignores_digest() {
        let mut a = snap(100);
        let mut b = snap(100);
        a.content_digest = Some(ContentDigest::of(b"a"));
        b.content_digest = Some(ContentDigest::of(b"b"));
        assert!(a.stat_eq(&b));
    }

    #[test]
    fn stat_eq_detects_mtime_change() {
        assert!(!snap(100).stat_eq(&snap(200)));
    }

    #[test]
    fn snapshot_key_monotonicity() {
        let s1 = snap(100);
        let s2 = snap(200);
        let key_before = SnapshotKey::from_snapshot(&s1, 1);
        assert!(key_before.matches_snapshot(&s1));
        assert!(!key_before.matches_snapshot(&s2));
        let key_after = SnapshotKey::from_snapshot(&s2, 1);
        assert!(key_after.matches_snapshot(&s2));
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(ContentDigest::of(b"hello"), ContentDigest::of(b"hello"));
        assert_ne!(ContentDigest::of(b"hello"), ContentDigest::of(b"world"));
    }
}
