//! On-disk result cache: `.{appname}/creation-time`, `status.db`, and
//! `results/<digest-prefix>/<digest>` compressed blobs.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use monitor_core::path::RepoPath;
use monitor_core::snapshot::SnapshotKey;
use monitor_core::status::Status;

use crate::frame::{self, FrameError, STATUS_AGGREGATE_SCHEMA_TAG};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// One persisted (path, tool) record inside the status aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub snapshot_key: SnapshotKey,
    pub status: Status,
    /// Digest of the blob under `results/`, present iff status is terminal.
    pub body_digest: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersistedOrientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersistedSort {
    ByTypeDir,
    ByDirType,
}

/// `{path → {tool → (snapshot_key, status, body_ref)}}` plus application
/// state, as a single serialized aggregate (spec.md §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusAggregate {
    pub entries: HashMap<String, HashMap<String, EntryRecord>>,
    pub cursor: (usize, usize),
    pub sort: Option<PersistedSort>,
    pub orientation: Option<PersistedOrientation>,
    pub paused: bool,
}

impl StatusAggregate {
    /// Every blob digest currently referenced, for GC at startup.
    pub fn referenced_digests(&self) -> impl Iterator<Item = &str> {
        self.entries.values().flat_map(|tools| tools.values()).filter_map(|r| r.body_digest.as_deref())
    }
}

enum WriterMsg {
    /// Debounced status aggregate write (coalesced — only the latest matters).
    Aggregate(StatusAggregate),
    /// Immediate blob write, never debounced.
    Blob { digest: String, body: Vec<u8> },
    Flush,
    Shutdown,
}

/// Debounce window for status aggregate writes (spec.md §4.3: "debounced ≥1s").
const AGGREGATE_DEBOUNCE: Duration = Duration::from_secs(1);

pub struct ResultCache {
    cache_dir: PathBuf,
    creation_time_ms: u64,
    compression_level: u32,
    tx: Sender<WriterMsg>,
    flush_sync: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
    foreign: Arc<Mutex<bool>>,
}

impl ResultCache {
    /// Open (or initialize) the cache directory under `root/.{appname}/`.
    /// Returns the cache handle plus whatever status aggregate could be
    /// loaded (empty if absent or torn — a torn `status.db` triggers the
    /// full rescan mandated by spec.md §7, which the caller performs by
    /// simply treating the returned aggregate as empty).
    pub fn open(root: &Path, appname: &str, compression_level: u32) -> Result<(Self, StatusAggregate), CacheError> {
        let cache_dir = root.join(format!(".{appname}"));
        fs::create_dir_all(cache_dir.join("results"))?;

        let creation_time_ms = load_or_init_creation_time(&cache_dir)?;
        let aggregate = load_status_aggregate(&cache_dir).unwrap_or_default();

        gc_unreferenced_blobs(&cache_dir, &aggregate)?;

        let (tx, rx) = mpsc::channel();
        let flush_sync = Arc::new((Mutex::new(false), Condvar::new()));
        let foreign = Arc::new(Mutex::new(false));

        let handle = {
            let cache_dir = cache_dir.clone();
            let flush_sync = flush_sync.clone();
            let compression_level = compression_level.min(9);
            thread::Builder::new()
                .name("result-cache-writer".to_string())
                .spawn(move || writer_loop(rx, cache_dir, compression_level, flush_sync))
                .expect("failed to spawn result-cache writer thread")
        };

        Ok((
            Self { cache_dir, creation_time_ms, compression_level: compression_level.min(9), tx, flush_sync, handle: Some(handle), foreign },
            aggregate,
        ))
    }

    /// Digest for a `(path, tool, content_digest)` triple (spec.md §4.3:
    /// "identical content produces identical digests across runs").
    pub fn blob_digest(path: &RepoPath, tool_name: &str, content_digest: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(tool_name.as_bytes());
        hasher.update([0]);
        if let Some(d) = content_digest {
            hasher.update(d.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Re-read `creation-time` and compare against what we opened with.
    /// If it changed, another instance has claimed the cache and this
    /// process must disable writes (spec.md §4.3).
    pub fn check_ownership(&self) -> bool {
        let current = read_creation_time(&self.cache_dir).unwrap_or(self.creation_time_ms);
        let foreign = current != self.creation_time_ms;
        if foreign {
            *self.foreign.lock().unwrap_or_else(|e| e.into_inner()) = true;
        }
        !foreign
    }

    pub fn is_foreign(&self) -> bool {
        *self.foreign.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a debounced status aggregate save. No-op once the cache has
    /// been marked foreign.
    pub fn save_aggregate(&self, aggregate: StatusAggregate) {
        if self.is_foreign() {
            return;
        }
        let _ = self.tx.send(WriterMsg::Aggregate(aggregate));
    }

    /// Queue an immediate blob write (compressed with the configured
    /// level). No-op once the cache has been marked foreign.
    pub fn save_blob(&self, digest: String, body: Vec<u8>) {
        if self.is_foreign() {
            return;
        }
        let _ = self.tx.send(WriterMsg::Blob { digest, body });
    }

    /// Load and decompress a persisted blob body.
    pub fn load_blob(&self, digest: &str) -> Result<Vec<u8>, CacheError> {
        let path = blob_path(&self.cache_dir, digest);
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(file);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Block until all queued writes have hit disk. Used on clean shutdown.
    pub fn flush(&self) {
        {
            let (lock, _) = &*self.flush_sync;
            *lock.lock().unwrap_or_else(|e| e.into_inner()) = false;
        }
        let _ = self.tx.send(WriterMsg::Flush);
        let (lock, cvar) = &*self.flush_sync;
        let mut flushed = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*flushed {
            let result = cvar.wait_timeout(flushed, Duration::from_secs(5)).unwrap_or_else(|e| e.into_inner());
            flushed = result.0;
            if result.1.timed_out() {
                break;
            }
        }
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        self.flush();
        let _ = self.tx.send(WriterMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn blob_path(cache_dir: &Path, digest: &str) -> PathBuf {
    let prefix = &digest[..2.min(digest.len())];
    cache_dir.join("results").join(prefix).join(digest)
}

/// Write `bytes` to `final_path` via a `.tmp` file, fsync, then atomic
/// rename (spec.md §4.3 write protocol). On any failure the `.tmp` is
/// removed and the error is logged, never propagated to the UI thread.
fn atomic_write(final_path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = final_path.with_extension(format!(
        "{}.tmp",
        final_path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    let result = (|| {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, final_path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn load_or_init_creation_time(cache_dir: &Path) -> Result<u64, CacheError> {
    if let Some(existing) = read_creation_time(cache_dir) {
        return Ok(existing);
    }
    let now = now_ms();
    atomic_write(&cache_dir.join("creation-time"), now.to_string().as_bytes())?;
    Ok(now)
}

fn read_creation_time(cache_dir: &Path) -> Option<u64> {
    fs::read_to_string(cache_dir.join("creation-time")).ok()?.trim().parse().ok()
}

fn status_db_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("status.db")
}

fn load_status_aggregate(cache_dir: &Path) -> Option<StatusAggregate> {
    let path = status_db_path(cache_dir);
    let mut file = File::open(path).ok()?;
    match frame::read_frame(&mut file, STATUS_AGGREGATE_SCHEMA_TAG) {
        Ok(Some(aggregate)) => Some(aggregate),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("status.db is torn or unreadable ({e}); falling back to full rescan");
            None
        }
    }
}

fn gc_unreferenced_blobs(cache_dir: &Path, aggregate: &StatusAggregate) -> Result<(), CacheError> {
    let referenced: std::collections::HashSet<&str> = aggregate.referenced_digests().collect();
    let results_dir = cache_dir.join("results");
    let Ok(prefixes) = fs::read_dir(&results_dir) else { return Ok(()) };
    for prefix_entry in prefixes.flatten() {
        let Ok(blobs) = fs::read_dir(prefix_entry.path()) else { continue };
        for blob_entry in blobs.flatten() {
            let name = blob_entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".tmp") || referenced.contains(name.as_ref()) {
                continue;
            }
            let _ = fs::remove_file(blob_entry.path());
        }
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn writer_loop(rx: Receiver<WriterMsg>, cache_dir: PathBuf, compression_level: u32, flush_sync: Arc<(Mutex<bool>, Condvar)>) {
    let mut pending_aggregate: Option<StatusAggregate> = None;
    let mut pending_blobs: Vec<(String, Vec<u8>)> = Vec::new();

    loop {
        let msg = if pending_aggregate.is_some() {
            match rx.recv_timeout(AGGREGATE_DEBOUNCE) {
                Ok(msg) => Some(msg),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            }
        };

        match msg {
            Some(WriterMsg::Aggregate(aggregate)) => {
                pending_aggregate = Some(aggregate);
                continue;
            }
            Some(WriterMsg::Blob { digest, body }) => {
                pending_blobs.push((digest, body));
                continue;
            }
            Some(WriterMsg::Flush) => {
                flush_blobs(&cache_dir, compression_level, &mut pending_blobs);
                flush_aggregate(&cache_dir, pending_aggregate.take());
                let (lock, cvar) = &*flush_sync;
                *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
                cvar.notify_all();
                continue;
            }
            Some(WriterMsg::Shutdown) => {
                flush_blobs(&cache_dir, compression_level, &mut pending_blobs);
                flush_aggregate(&cache_dir, pending_aggregate.take());
                break;
            }
            None => {
                flush_blobs(&cache_dir, compression_level, &mut pending_blobs);
                flush_aggregate(&cache_dir, pending_aggregate.take());
            }
        }
    }
}

fn flush_blobs(cache_dir: &Path, compression_level: u32, pending: &mut Vec<(String, Vec<u8>)>) {
    for (digest, body) in pending.drain(..) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(compression_level));
        if encoder.write_all(&body).is_err() {
            continue;
        }
        let Ok(compressed) = encoder.finish() else { continue };
        if let Err(e) = atomic_write(&blob_path(cache_dir, &digest), &compressed) {
            tracing::error!("failed to write cache blob {digest}: {e}");
        }
    }
}

fn flush_aggregate(cache_dir: &Path, aggregate: Option<StatusAggregate>) {
    let Some(aggregate) = aggregate else { return };
    let mut buf = Vec::new();
    if let Err(e) = frame::write_frame(&mut buf, STATUS_AGGREGATE_SCHEMA_TAG, &aggregate) {
        tracing::error!("failed to encode status aggregate: {e}");
        return;
    }
    if let Err(e) = atomic_write(&status_db_path(cache_dir), &buf) {
        tracing::error!("failed to write status.db: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::snapshot::FileSnapshot;
    use tempfile::tempdir;

    fn snapshot_key() -> SnapshotKey {
        let s = FileSnapshot { size: 1, mtime_ns: 1, mode: 0o644, ino: 1, mountdev: 1, content_digest: None };
        SnapshotKey::from_snapshot(&s, 1)
    }

    #[test]
    fn open_creates_creation_time_once() {
        let dir = tempdir().unwrap();
        let (cache, aggregate) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        assert!(aggregate.entries.is_empty());
        let first = cache.creation_time_ms;
        drop(cache);
        let (cache2, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        assert_eq!(cache2.creation_time_ms, first);
    }

    #[test]
    fn blob_round_trips_through_compression() {
        let dir = tempdir().unwrap();
        let (cache, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        let digest = "abcd1234".to_string();
        cache.save_blob(digest.clone(), b"hello world".to_vec());
        cache.flush();
        let loaded = cache.load_blob(&digest).unwrap();
        assert_eq!(loaded, b"hello world");
    }

    #[test]
    fn aggregate_round_trips() {
        let dir = tempdir().unwrap();
        let (cache, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        let mut aggregate = StatusAggregate::default();
        aggregate.entries.entry("a.py".to_string()).or_default().insert(
            "python_syntax".to_string(),
            EntryRecord { snapshot_key: snapshot_key(), status: Status::Ok, body_digest: Some("deadbeef".to_string()) },
        );
        cache.save_aggregate(aggregate.clone());
        cache.flush();
        drop(cache);

        let (_, reloaded) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        assert_eq!(reloaded.entries["a.py"]["python_syntax"].status, Status::Ok);
    }

    #[test]
    fn gc_removes_unreferenced_blob() {
        let dir = tempdir().unwrap();
        let (cache, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        cache.save_blob("orphan".to_string(), b"x".to_vec());
        cache.flush();
        drop(cache);

        let (_, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        let path = blob_path(&dir.path().join(".monitor"), "orphan");
        assert!(!path.exists());
    }

    #[test]
    fn foreign_creation_time_disables_writes() {
        let dir = tempdir().unwrap();
        let (cache, _) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        // Simulate a second instance claiming the cache.
        let creation_time_path = dir.path().join(".monitor").join("creation-time");
        atomic_write(&creation_time_path, b"999999999999").unwrap();
        assert!(!cache.check_ownership());
        assert!(cache.is_foreign());
    }

    #[test]
    fn torn_status_db_falls_back_to_empty_aggregate() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".monitor")).unwrap();
        fs::write(dir.path().join(".monitor").join("status.db"), b"not a valid frame at all").unwrap();
        let (_, aggregate) = ResultCache::open(dir.path(), "monitor", 6).unwrap();
        assert!(aggregate.entries.is_empty());
    }
}
