//! Live filesystem change stream, built on `notify` the same way the
//! teacher's `FileWatcher` wraps it: a background watcher thread feeds a
//! channel, and callers drain it on their own schedule rather than
//! being called back directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use monitor_core::path::RepoPath;

use crate::error::FsError;
use crate::scan::is_under_cache_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEventKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: RepoPath,
    pub kind: FsEventKind,
}

/// Coalescing window: rapid-fire events against the same path within
/// this window collapse into the single most-recent one.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(50);

pub struct FsSynchronizer {
    root: PathBuf,
    cache_dir_name: String,
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    rename_from: Option<(PathBuf, Instant)>,
}

impl FsSynchronizer {
    pub fn new(root: &Path, appname: &str) -> Result<Self, FsError> {
        let root = std::fs::canonicalize(root)?;
        let (tx, rx): (Sender<notify::Result<Event>>, Receiver<notify::Result<Event>>) = unbounded();
        let mut watcher = RecommendedWatcher::new(move |event| {
            let _ = tx.send(event);
        }, Config::default())?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        Ok(Self { root, cache_dir_name: format!(".{appname}"), _watcher: watcher, rx, rename_from: None })
    }

    /// Block briefly for the first event, then drain anything else
    /// already queued within `COALESCE_WINDOW`, collapsing duplicate
    /// paths to their last-seen kind.
    pub fn poll_events(&mut self, timeout: Duration) -> Vec<FsEvent> {
        let mut collected: HashMap<RepoPath, FsEventKind> = HashMap::new();
        let deadline = Instant::now() + timeout;

        let Ok(first) = self.rx.recv_timeout(timeout) else { return Vec::new() };
        self.absorb(first, &mut collected);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.rx.recv_timeout(remaining.min(COALESCE_WINDOW)) {
                Ok(event) => self.absorb(event, &mut collected),
                Err(_) => break,
            }
        }

        collected.into_iter().map(|(path, kind)| FsEvent { path, kind }).collect()
    }

    fn absorb(&mut self, event: notify::Result<Event>, collected: &mut HashMap<RepoPath, FsEventKind>) {
        let Ok(event) = event else { return };
        for path in &event.paths {
            let Ok(rel) = path.strip_prefix(&self.root) else { continue };
            if is_under_cache_dir(rel, &self.cache_dir_name) {
                continue;
            }
            let Ok(repo_path) = RepoPath::new(rel) else { continue };

            match &event.kind {
                EventKind::Create(_) => {
                    collected.insert(repo_path, FsEventKind::Added);
                }
                EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::From)) => {
                    self.rename_from = Some((path.clone(), Instant::now()));
                }
                EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::To)) => {
                    // A rename is handled as Removed(src) + Added(dst) for
                    // simplicity: the destination gets a fresh row, reclassified
                    // against its own extension, rather than inheriting the
                    // source row's stale tool statuses.
                    if let Some((from, _)) = self.rename_from.take() {
                        if let Ok(from_rel) = from.strip_prefix(&self.root) {
                            if let Ok(from_repo) = RepoPath::new(from_rel) {
                                collected.insert(from_repo, FsEventKind::Removed);
                            }
                        }
                    }
                    collected.insert(repo_path, FsEventKind::Added);
                }
                EventKind::Modify(_) => {
                    collected.entry(repo_path).or_insert(FsEventKind::Modified);
                }
                EventKind::Remove(_) => {
                    collected.insert(repo_path, FsEventKind::Removed);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn detects_file_creation() {
        let dir = tempdir().unwrap();
        let mut sync = FsSynchronizer::new(dir.path(), "monitor").unwrap();
        fs::write(dir.path().join("a.py"), b"x").unwrap();
        let events = sync.poll_events(Duration::from_secs(2));
        assert!(events.iter().any(|e| e.path.as_str() == "a.py" && matches!(e.kind, FsEventKind::Added)));
    }

    #[test]
    fn ignores_cache_directory_events() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".monitor")).unwrap();
        let mut sync = FsSynchronizer::new(dir.path(), "monitor").unwrap();
        fs::write(dir.path().join(".monitor").join("status.db"), b"x").unwrap();
        let events = sync.poll_events(Duration::from_millis(300));
        assert!(events.is_empty());
    }
}
