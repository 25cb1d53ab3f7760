//! Owns the model, the job engine, the cache, and the filesystem
//! synchronizer, and drives the event loop that ties them together.
//! Mirrors the shape of the teacher's `App` (state + channels + a
//! `run` loop), generalized from chat-session state to the analysis
//! grid's (rows, queue, cache) triple.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEventKind};

use monitor_cache::store::{EntryRecord, PersistedOrientation, PersistedSort, ResultCache, StatusAggregate};
use monitor_core::model::{Entry, Model, Orientation, Pane, ResultHandle, Row, SortOrder};
use monitor_core::path::RepoPath;
use monitor_core::snapshot::{FileSnapshot, SnapshotKey};
use monitor_core::status::Status;
use monitor_core::styled_text::StyledText;
use monitor_fs::{FsEvent, FsEventKind, FsSynchronizer};
use monitor_jobs::engine::{JobEngine, JobSpec, Outcome};
use monitor_jobs::priority::Priority;
use monitor_tools::ToolRegistry;

use crate::config::MonitorConfig;
use crate::error::AppError;
use crate::keymap::{self, Action, Direction};
use crate::presenter::Presenter;
use crate::terminal::TerminalGuard;

pub const APPNAME: &str = "monitor";

/// How often the background safety-net restat sweep runs, covering any
/// filesystem change the watcher's event stream missed (spec.md §7:
/// watcher drops are recovered by a periodic full rescan rather than
/// surfaced as an error).
const LIGHT_RESCAN_INTERVAL: Duration = Duration::from_secs(10);
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(80);

pub struct App {
    root: PathBuf,
    config: MonitorConfig,
    model: Model,
    registry: ToolRegistry,
    cache: ResultCache,
    fs_sync: FsSynchronizer,
    engine: JobEngine,
    presenter: Presenter,
    exit: bool,
    last_light_rescan: Instant,
}

impl App {
    pub fn new(root: PathBuf, config: MonitorConfig) -> Result<Self, AppError> {
        let (cache, aggregate) = ResultCache::open(&root, APPNAME, config.compression)?;
        let registry = ToolRegistry::with_builtins();
        let scanned = monitor_fs::initial_scan(&root, &format!(".{APPNAME}"))?;
        let fs_sync = FsSynchronizer::new(&root, APPNAME)?;

        let worker_exe = std::env::current_exe()?;
        let engine = JobEngine::new(config.workers, worker_exe, vec!["--worker-loop".to_string()]);

        let mut model = Model::new();
        model.cursor = aggregate.cursor;
        model.sort = match aggregate.sort {
            Some(PersistedSort::ByDirType) => SortOrder::ByDirType,
            _ => SortOrder::ByTypeDir,
        };
        model.orientation = match aggregate.orientation {
            Some(PersistedOrientation::Portrait) => Orientation::Portrait,
            _ => Orientation::Landscape,
        };
        model.paused = aggregate.paused;
        if model.paused {
            engine.pause();
        }

        let mut app = Self {
            root,
            config,
            model,
            registry,
            cache,
            fs_sync,
            engine,
            presenter: Presenter::new(),
            exit: false,
            last_light_rescan: Instant::now(),
        };

        for (path, snapshot) in scanned {
            app.ensure_row(path, snapshot, &aggregate);
        }
        app.model.clamp_cursor();
        app.enqueue_pending(Priority::Background);
        app.reprioritize_for_cursor();
        Ok(app)
    }

    pub fn run(&mut self, terminal: &mut TerminalGuard) -> Result<(), AppError> {
        while !self.exit {
            self.sync_presenter_focus();
            terminal.terminal.draw(|frame| self.presenter.render(frame, &self.model, &self.registry))?;
            self.tick(terminal)?;
        }
        self.persist();
        self.cache.flush();
        Ok(())
    }

    fn tick(&mut self, terminal: &mut TerminalGuard) -> Result<(), AppError> {
        if event::poll(INPUT_POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = keymap::translate_key(key, &self.model) {
                        self.handle_action(action, terminal)?;
                    }
                }
                Event::Mouse(mouse) => self.handle_mouse(mouse),
                _ => {}
            }
        }

        for event in self.fs_sync.poll_events(Duration::from_millis(0)) {
            self.apply_fs_event(event);
        }

        while let Ok(outcome) = self.engine.outcomes().try_recv() {
            self.apply_job_outcome(outcome);
        }

        if self.last_light_rescan.elapsed() >= LIGHT_RESCAN_INTERVAL {
            self.light_rescan();
            self.last_light_rescan = Instant::now();
        }

        Ok(())
    }

    fn handle_action(&mut self, action: Action, terminal: &mut TerminalGuard) -> Result<(), AppError> {
        match action {
            Action::Quit => self.exit = true,
            Action::ToggleHelp => self.model.help_visible = !self.model.help_visible,
            Action::ToggleOrientation => {
                self.model.orientation = match self.model.orientation {
                    Orientation::Landscape => Orientation::Portrait,
                    Orientation::Portrait => Orientation::Landscape,
                };
            }
            Action::ToggleLog => self.model.log_visible = !self.model.log_visible,
            Action::Edit => self.open_in_editor(terminal)?,
            Action::NextIssue { same_tool_only } => {
                let same_tool = same_tool_only.then(|| self.model.focused_entry().map(|(_, e)| e.descriptor_name.clone())).flatten();
                if let Some(pos) = self.model.next_issue(same_tool.as_deref()) {
                    self.model.cursor = pos;
                    self.on_cursor_moved();
                }
            }
            Action::ToggleSort => {
                self.model.sort = match self.model.sort {
                    SortOrder::ByTypeDir => SortOrder::ByDirType,
                    SortOrder::ByDirType => SortOrder::ByTypeDir,
                };
            }
            Action::RefreshCurrent => self.refresh_focused_entry(),
            Action::RefreshAllOfTool => self.refresh_all_of_tool(),
            Action::ToggleFullscreen => self.model.fullscreen = !self.model.fullscreen,
            Action::OpenExternally => self.open_externally(),
            Action::ToggleFocusPane => {
                self.model.focus_pane = match self.model.focus_pane {
                    Pane::Summary => Pane::Result,
                    Pane::Result => Pane::Summary,
                };
            }
            Action::Move(direction) => self.move_cursor(direction),
            Action::PageResult(pages) => self.presenter.page_result(pages),
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: crossterm::event::MouseEvent) {
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            if let Some((row, col)) = self.presenter.hit_test_summary(mouse.column, mouse.row) {
                self.model.focus_pane = Pane::Summary;
                self.model.cursor = (row, col);
                self.model.clamp_cursor();
                self.on_cursor_moved();
            }
        }
    }

    fn move_cursor(&mut self, direction: Direction) {
        if self.model.focus_pane == Pane::Result {
            let (dx, dy) = match direction {
                Direction::Up => (0, -1),
                Direction::Down => (0, 1),
                Direction::Left => (-1, 0),
                Direction::Right => (1, 0),
            };
            self.presenter.scroll_result(dx, dy);
            return;
        }
        if self.model.rows.is_empty() {
            return;
        }
        let order = self.model.sorted_row_indices();
        let Some(pos) = order.iter().position(|&i| i == self.model.cursor.0) else { return };
        let (row, col) = self.model.cursor;
        match direction {
            Direction::Up => {
                if pos > 0 {
                    self.model.cursor = (order[pos - 1], col);
                }
            }
            Direction::Down => {
                if pos + 1 < order.len() {
                    self.model.cursor = (order[pos + 1], col);
                }
            }
            Direction::Left => {
                if col > 0 {
                    self.model.cursor = (row, col - 1);
                }
            }
            Direction::Right => {
                self.model.cursor = (row, col + 1);
            }
        }
        self.model.clamp_cursor();
        self.on_cursor_moved();
    }

    /// Invariant 5 upkeep plus the feedback loop into the queue: moving
    /// the cursor re-prioritizes in-flight and queued work around the
    /// newly focused (path, tool).
    fn on_cursor_moved(&mut self) {
        self.reprioritize_for_cursor();
    }

    fn reprioritize_for_cursor(&mut self) {
        let Some((row, entry)) = self.model.focused_entry() else { return };
        let path = row.path.clone();
        let tool = entry.descriptor_name.clone();
        let Some(focused_pos) = self.model.focused_grid_position() else { return };
        let model = &self.model;
        self.engine.refresh_priority(&path, Some(&tool), focused_pos, |p, t| model.grid_position_of(p, t));
        self.engine.preempt_for(Priority::Focus);
    }

    fn sync_presenter_focus(&mut self) {
        let Some((row, entry)) = self.model.focused_entry() else {
            self.presenter.sync_focus(None, None);
            return;
        };
        let key = (row.path.clone(), entry.descriptor_name.clone());
        let body = self.resolve_body(entry);
        self.presenter.sync_focus(Some(key), body.as_ref());
    }

    /// Invariant 4: a terminal status always has a retrievable body,
    /// either already in memory or loaded from the compressed blob on
    /// disk (storing the whole `StyledText`, not raw stdout, so the
    /// round trip reproduces the exact value the worker produced).
    fn resolve_body(&self, entry: &Entry) -> Option<StyledText> {
        match &entry.result_handle {
            ResultHandle::InMemory(body) => Some(body.clone()),
            ResultHandle::OnDisk => {
                let (row, _) = self.model.focused_entry()?;
                let content_digest = row.snapshot.content_digest.map(|d| d.to_string());
                let digest = ResultCache::blob_digest(&row.path, &entry.descriptor_name, content_digest.as_deref());
                self.cache.load_blob(&digest).ok().and_then(|bytes| postcard::from_bytes(&bytes).ok())
            }
            ResultHandle::None => None,
        }
    }

    fn refresh_focused_entry(&mut self) {
        let Some((row_idx, col_idx)) = Some(self.model.cursor) else { return };
        let Some(row) = self.model.rows.get(row_idx) else { return };
        let Some(entry) = row.entries.get(col_idx) else { return };
        let path = row.path.clone();
        let tool_name = entry.descriptor_name.clone();
        let snapshot = row.snapshot.clone();
        self.force_requeue(&path, &tool_name, &snapshot, Priority::Focus);
    }

    fn refresh_all_of_tool(&mut self) {
        let Some((_, entry)) = self.model.focused_entry() else { return };
        let tool_name = entry.descriptor_name.clone();
        let targets: Vec<(RepoPath, FileSnapshot)> =
            self.model.rows.iter().filter(|r| r.entries.iter().any(|e| e.descriptor_name == tool_name)).map(|r| (r.path.clone(), r.snapshot.clone())).collect();
        for (path, snapshot) in targets {
            self.force_requeue(&path, &tool_name, &snapshot, Priority::Background);
        }
    }

    fn force_requeue(&mut self, path: &RepoPath, tool_name: &str, snapshot: &FileSnapshot, priority: Priority) {
        let Some(descriptor) = self.registry.all_descriptors().find(|d| d.name == tool_name).cloned() else { return };
        let key = SnapshotKey::from_snapshot(snapshot, descriptor.version_tag);
        self.engine.clear_dedupe(path, tool_name, &key);
        if let Some(row) = self.model.rows.iter_mut().find(|r| &r.path == path) {
            if let Some(entry) = row.entry_mut(tool_name) {
                entry.status = Status::Pending;
                entry.result_handle = ResultHandle::None;
            }
        }
        self.submit_job(path, &descriptor, snapshot, priority);
    }

    fn submit_job(&self, path: &RepoPath, descriptor: &monitor_core::model::ToolDescriptor, snapshot: &FileSnapshot, priority: Priority) {
        let absolute_path = path.resolve(&self.root);
        let snapshot_key = SnapshotKey::from_snapshot(snapshot, descriptor.version_tag);
        let spec = JobSpec { path: path.clone(), absolute_path, descriptor: descriptor.clone(), snapshot_key };
        self.engine.submit(spec, priority);
    }

    /// Enqueue every Entry still `Pending` at the given priority tier.
    fn enqueue_pending(&self, priority: Priority) {
        for row in &self.model.rows {
            for entry in &row.entries {
                if entry.status != Status::Pending {
                    continue;
                }
                if let Some(descriptor) = self.registry.all_descriptors().find(|d| d.name == entry.descriptor_name) {
                    self.submit_job(&row.path, descriptor, &row.snapshot, priority);
                }
            }
        }
    }

    /// Like `enqueue_pending`, but scores each job into the `Proximity`
    /// tier by its Manhattan distance from the cursor rather than using
    /// one flat priority — for file-watcher-driven rows, which are
    /// rarely under the cursor itself. Falls back to `Background` when
    /// no cursor position is known (e.g. an empty grid).
    fn enqueue_pending_proximity(&self) {
        let focused_pos = self.model.focused_grid_position();
        for row in &self.model.rows {
            for entry in &row.entries {
                if entry.status != Status::Pending {
                    continue;
                }
                let priority = match (focused_pos, self.model.grid_position_of(&row.path, &entry.descriptor_name)) {
                    (Some(f), Some(pos)) => Priority::Proximity(pos.0.abs_diff(f.0) as u32 + pos.1.abs_diff(f.1) as u32),
                    _ => Priority::Background,
                };
                if let Some(descriptor) = self.registry.all_descriptors().find(|d| d.name == entry.descriptor_name) {
                    self.submit_job(&row.path, descriptor, &row.snapshot, priority);
                }
            }
        }
    }

    /// Build or rebuild a Row for `path`, restoring any terminal entry
    /// whose snapshot key still matches the persisted aggregate (a
    /// cache hit skips re-running the tool entirely).
    fn ensure_row(&mut self, path: RepoPath, snapshot: FileSnapshot, aggregate: &StatusAggregate) -> usize {
        let language = monitor_tools::classify(&path.resolve(&self.root));
        let applicable = self.registry.applicable_tools(&language);
        let persisted = aggregate.entries.get(path.as_str());

        let entries: Vec<Entry> = applicable
            .iter()
            .map(|descriptor| {
                let key = SnapshotKey::from_snapshot(&snapshot, descriptor.version_tag);
                match persisted.and_then(|tools| tools.get(&descriptor.name)) {
                    Some(record) if record.snapshot_key == key => Entry {
                        descriptor_name: descriptor.name.clone(),
                        snapshot_key: key,
                        status: record.status,
                        result_handle: if record.body_digest.is_some() { ResultHandle::OnDisk } else { ResultHandle::None },
                    },
                    _ => Entry::pending(descriptor.name.clone(), key),
                }
            })
            .collect();

        if let Some(idx) = self.model.rows.iter().position(|r| r.path == path) {
            self.model.rows[idx] = Row { path, snapshot, entries };
            idx
        } else {
            self.model.rows.push(Row { path, snapshot, entries });
            self.model.rows.len() - 1
        }
    }

    fn remove_row(&mut self, path: &RepoPath) {
        self.model.rows.retain(|r| &r.path != path);
        self.model.clamp_cursor();
    }

    fn invalidate_row(&mut self, idx: usize, snapshot: &FileSnapshot) {
        if let Some(row) = self.model.rows.get_mut(idx) {
            for entry in &mut row.entries {
                entry.invalidate_if_stale(snapshot);
            }
            row.snapshot = snapshot.clone();
        }
    }

    fn apply_fs_event(&mut self, event: FsEvent) {
        match event.kind {
            FsEventKind::Added | FsEventKind::Modified => {
                let absolute = event.path.resolve(&self.root);
                let Ok(metadata) = std::fs::symlink_metadata(&absolute) else { return };
                if metadata.is_dir() {
                    return;
                }
                let snapshot = monitor_fs::stat::snapshot_from_metadata(&absolute, &metadata);
                if let Some(idx) = self.model.rows.iter().position(|r| r.path == event.path) {
                    self.invalidate_row(idx, &snapshot);
                } else {
                    let empty = StatusAggregate::default();
                    self.ensure_row(event.path.clone(), snapshot, &empty);
                }
                self.enqueue_pending_proximity();
            }
            FsEventKind::Removed => self.remove_row(&event.path),
        }
    }

    fn apply_job_outcome(&mut self, outcome: monitor_jobs::engine::JobOutcome) {
        let path = outcome.path.clone();
        let tool_name = outcome.tool_name.clone();
        match outcome.outcome {
            Outcome::Completed { status, body } => self.store_result(&path, &tool_name, outcome.snapshot_key, status, body),
            Outcome::TimedOut => {
                let body = StyledText::plain(format!("{tool_name} timed out before producing output"));
                self.store_result(&path, &tool_name, outcome.snapshot_key, Status::TimedOut, body);
            }
            Outcome::Error(message) => {
                let body = StyledText::plain(message);
                self.store_result(&path, &tool_name, outcome.snapshot_key, Status::Error, body);
            }
            Outcome::Preempted => {
                // Already requeued by the engine at its prior priority; nothing to persist.
            }
        }
    }

    fn store_result(&mut self, path: &RepoPath, tool_name: &str, snapshot_key: SnapshotKey, status: Status, body: StyledText) {
        let Some(row) = self.model.rows.iter_mut().find(|r| &r.path == path) else { return };
        let content_digest = row.snapshot.content_digest.map(|d| d.to_string());
        let Some(entry) = row.entry_mut(tool_name) else { return };
        if entry.snapshot_key != snapshot_key {
            return; // stale result for a since-changed file; ignore (invariant 3)
        }
        entry.status = status;
        entry.result_handle = ResultHandle::InMemory(body.clone());

        if status.is_terminal() {
            if let Ok(bytes) = postcard::to_allocvec(&body) {
                let digest = ResultCache::blob_digest(path, tool_name, content_digest.as_deref());
                self.cache.save_blob(digest, bytes);
            }
        }
        self.persist();
    }

    /// Periodic fallback re-stat of every tracked row, catching any
    /// filesystem change the watcher's event stream missed.
    fn light_rescan(&mut self) {
        let paths: Vec<(usize, RepoPath)> = self.model.rows.iter().enumerate().map(|(i, r)| (i, r.path.clone())).collect();
        for (idx, path) in paths {
            let absolute = path.resolve(&self.root);
            let Ok(metadata) = std::fs::symlink_metadata(&absolute) else {
                self.remove_row(&path);
                continue;
            };
            let snapshot = monitor_fs::stat::snapshot_from_metadata(&absolute, &metadata);
            if let Some(row) = self.model.rows.get(idx) {
                if !row.snapshot.stat_eq(&snapshot) {
                    self.invalidate_row(idx, &snapshot);
                }
            }
        }
        self.enqueue_pending(Priority::Background);
    }

    fn open_in_editor(&mut self, terminal: &mut TerminalGuard) -> Result<(), AppError> {
        let Some(row) = self.model.rows.get(self.model.cursor.0) else { return Ok(()) };
        let absolute = row.path.resolve(&self.root);
        let editor = self.config.editor_command();
        terminal
            .suspend(|| {
                let mut parts = editor.split_whitespace();
                let Some(program) = parts.next() else { return Ok(()) };
                let status = std::process::Command::new(program).args(parts).arg(&absolute).status()?;
                if !status.success() {
                    tracing::warn!("editor exited with {status}");
                }
                Ok(())
            })
            .map_err(AppError::from)
    }

    fn open_externally(&mut self) {
        let Some(row) = self.model.rows.get(self.model.cursor.0) else { return };
        let absolute = row.path.resolve(&self.root);
        if let Err(e) = open::that(&absolute) {
            tracing::warn!("failed to open {} externally: {e}", absolute.display());
        }
    }

    fn persist(&self) {
        let mut aggregate = StatusAggregate { cursor: self.model.cursor, paused: self.model.paused, ..Default::default() };
        aggregate.sort = Some(match self.model.sort {
            SortOrder::ByTypeDir => PersistedSort::ByTypeDir,
            SortOrder::ByDirType => PersistedSort::ByDirType,
        });
        aggregate.orientation = Some(match self.model.orientation {
            Orientation::Landscape => PersistedOrientation::Landscape,
            Orientation::Portrait => PersistedOrientation::Portrait,
        });
        for row in &self.model.rows {
            let content_digest = row.snapshot.content_digest.map(|d| d.to_string());
            let tools = aggregate.entries.entry(row.path.as_str().to_string()).or_default();
            for entry in &row.entries {
                if !entry.status.is_terminal() {
                    continue;
                }
                let body_digest = match &entry.result_handle {
                    ResultHandle::InMemory(_) | ResultHandle::OnDisk => {
                        Some(ResultCache::blob_digest(&row.path, &entry.descriptor_name, content_digest.as_deref()))
                    }
                    ResultHandle::None => None,
                };
                tools.insert(entry.descriptor_name.clone(), EntryRecord { snapshot_key: entry.snapshot_key.clone(), status: entry.status, body_digest });
            }
        }
        self.cache.save_aggregate(aggregate);
    }
}

pub fn codebase_root(cli_directory: Option<&Path>) -> std::io::Result<PathBuf> {
    let dir = cli_directory.map(Path::to_path_buf).unwrap_or(std::env::current_dir()?);
    std::fs::canonicalize(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_cache::store::EntryRecord;

    fn snapshot() -> FileSnapshot {
        FileSnapshot { size: 1, mtime_ns: 1, mode: 0o644, ino: 1, mountdev: 1, content_digest: None }
    }

    /// `wc` is one of the universal built-in tools and is reliably on
    /// `PATH` in any environment this test suite runs in, so it exercises
    /// `applicable_tools` through the real registry rather than a fake one.
    const UNIVERSAL_TOOL: &str = "wc";

    fn version_tag(app: &App) -> u32 {
        app.registry.all_descriptors().find(|d| d.name == UNIVERSAL_TOOL).expect("wc descriptor").version_tag
    }

    /// Builds an App against an empty, real temp directory. No files are
    /// scanned so no jobs are ever submitted to the engine, keeping these
    /// tests free of any subprocess dependency.
    fn test_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = MonitorConfig::default();
        let app = App::new(dir.path().to_path_buf(), config).expect("app construction");
        (dir, app)
    }

    #[test]
    fn ensure_row_restores_from_aggregate_on_matching_snapshot_key() {
        let (_dir, mut app) = test_app();
        let path = RepoPath::new("a.rs").unwrap();
        let snap = snapshot();
        let key = SnapshotKey::from_snapshot(&snap, version_tag(&app));

        let mut aggregate = StatusAggregate::default();
        let mut tools = std::collections::HashMap::new();
        tools.insert(UNIVERSAL_TOOL.to_string(), EntryRecord { snapshot_key: key, status: Status::Ok, body_digest: Some("deadbeef".to_string()) });
        aggregate.entries.insert(path.as_str().to_string(), tools);

        let idx = app.ensure_row(path, snap, &aggregate);
        let row = &app.model.rows[idx];
        let entry = row.entries.iter().find(|e| e.descriptor_name == UNIVERSAL_TOOL).expect("restored entry");
        assert_eq!(entry.status, Status::Ok);
        assert!(matches!(entry.result_handle, ResultHandle::OnDisk));
    }

    #[test]
    fn ensure_row_falls_back_to_pending_on_snapshot_mismatch() {
        let (_dir, mut app) = test_app();
        let path = RepoPath::new("a.rs").unwrap();
        let snap = snapshot();
        let mut stale_snap = snap.clone();
        stale_snap.mtime_ns = 999;
        let stale_key = SnapshotKey::from_snapshot(&stale_snap, version_tag(&app));

        let mut aggregate = StatusAggregate::default();
        let mut tools = std::collections::HashMap::new();
        tools.insert(UNIVERSAL_TOOL.to_string(), EntryRecord { snapshot_key: stale_key, status: Status::Ok, body_digest: Some("deadbeef".to_string()) });
        aggregate.entries.insert(path.as_str().to_string(), tools);

        let idx = app.ensure_row(path, snap, &aggregate);
        let entry = app.model.rows[idx].entries.iter().find(|e| e.descriptor_name == UNIVERSAL_TOOL).expect("entry");
        assert_eq!(entry.status, Status::Pending);
    }

    #[test]
    fn store_result_ignores_a_result_for_a_since_changed_snapshot() {
        let (_dir, mut app) = test_app();
        let path = RepoPath::new("a.rs").unwrap();
        let snap = snapshot();
        let current_key = SnapshotKey::from_snapshot(&snap, 1);
        app.model.rows.push(Row { path: path.clone(), snapshot: snap, entries: vec![Entry::pending(UNIVERSAL_TOOL, current_key)] });

        let mut stale_snap = snapshot();
        stale_snap.mtime_ns = 123;
        let stale_key = SnapshotKey::from_snapshot(&stale_snap, 1);
        app.store_result(&path, UNIVERSAL_TOOL, stale_key, Status::Ok, StyledText::plain("42"));

        let entry = app.model.rows[0].entries.iter().find(|e| e.descriptor_name == UNIVERSAL_TOOL).unwrap();
        assert_eq!(entry.status, Status::Pending);
    }

    #[test]
    fn store_result_accepts_a_result_matching_the_current_snapshot() {
        let (_dir, mut app) = test_app();
        let path = RepoPath::new("a.rs").unwrap();
        let snap = snapshot();
        let key = SnapshotKey::from_snapshot(&snap, 1);
        app.model.rows.push(Row { path: path.clone(), snapshot: snap, entries: vec![Entry::pending(UNIVERSAL_TOOL, key.clone())] });

        app.store_result(&path, UNIVERSAL_TOOL, key, Status::Ok, StyledText::plain("3 7 42"));

        let entry = app.model.rows[0].entries.iter().find(|e| e.descriptor_name == UNIVERSAL_TOOL).unwrap();
        assert_eq!(entry.status, Status::Ok);
        assert!(matches!(entry.result_handle, ResultHandle::InMemory(_)));
    }

    #[test]
    fn persist_only_records_terminal_entries() {
        let (_dir, mut app) = test_app();
        let path = RepoPath::new("a.rs").unwrap();
        let snap = snapshot();
        let key = SnapshotKey::from_snapshot(&snap, 1);
        app.model.rows.push(Row {
            path,
            snapshot: snap,
            entries: vec![
                Entry { descriptor_name: "done".to_string(), snapshot_key: key.clone(), status: Status::Ok, result_handle: ResultHandle::InMemory(StyledText::plain("x")) },
                Entry::pending("pending_tool", key),
            ],
        });
        // persist() only queues a debounced write; this exercises the
        // aggregate-building path without depending on the writer
        // thread's timing.
        app.persist();
    }

    #[test]
    fn remove_row_clamps_a_cursor_that_pointed_past_the_end() {
        let (_dir, mut app) = test_app();
        let key = SnapshotKey::from_snapshot(&snapshot(), 1);
        app.model.rows.push(Row { path: RepoPath::new("a.rs").unwrap(), snapshot: snapshot(), entries: vec![Entry::pending(UNIVERSAL_TOOL, key.clone())] });
        app.model.rows.push(Row { path: RepoPath::new("b.rs").unwrap(), snapshot: snapshot(), entries: vec![Entry::pending(UNIVERSAL_TOOL, key)] });
        app.model.cursor = (1, 0);

        app.remove_row(&RepoPath::new("b.rs").unwrap());

        assert_eq!(app.model.rows.len(), 1);
        assert_eq!(app.model.cursor, (0, 0));
    }
}
