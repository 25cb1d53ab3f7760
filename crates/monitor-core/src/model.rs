//! The in-memory model: ToolDescriptor, Entry, Row, Model.

use crate::path::RepoPath;
use crate::snapshot::{FileSnapshot, SnapshotKey};
use crate::status::Status;
use crate::styled_text::StyledText;

/// How a tool classifies its own exit: an exact exit-code table, a regex
/// matched against stdout, or a custom function pointer registered by
/// the tool registry. Kept as data (not a trait object) so descriptors
/// stay `Clone` and comparable for tests.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ExitClassifier {
    /// Exit 0 => Ok, anything else => Problem.
    ZeroIsOk,
    /// Exit 0 => Ok, nonzero and stdout non-empty => Problem, else Error.
    ZeroOkStdoutProblem,
    /// A fixed table of (exit_code => Status); falls through to Error.
    Table(Vec<(i32, Status)>),
}

impl ExitClassifier {
    /// `stdout_empty`/`stderr_empty` let `ZeroOkStdoutProblem` tell "ran
    /// clean" apart from "ran and wrote nothing to either stream", which
    /// a stdout-only check can't: a nonzero-exit tool that only reports
    /// on stderr (as several linters do) would otherwise misclassify as
    /// `Error` instead of `Problem`.
    pub fn classify(&self, exit_code: Option<i32>, stdout_empty: bool, stderr_empty: bool) -> Status {
        let Some(code) = exit_code else { return Status::Error };
        match self {
            ExitClassifier::ZeroIsOk => {
                if code == 0 {
                    Status::Ok
                } else {
                    Status::Problem
                }
            }
            ExitClassifier::ZeroOkStdoutProblem => {
                if code == 0 {
                    Status::Ok
                } else if !stdout_empty || !stderr_empty {
                    Status::Problem
                } else {
                    Status::Error
                }
            }
            ExitClassifier::Table(table) => {
                table.iter().find(|(c, _)| *c == code).map(|(_, s)| *s).unwrap_or(Status::Error)
            }
        }
    }
}

/// Static registration data for one analyzer tool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub color: crate::styled_text::Color,
    /// Argv template; `{path}` is substituted with the absolute file path.
    pub argv_template: Vec<String>,
    pub timeout_s: u64,
    pub version_tag: u32,
    pub classifier: ExitClassifier,
    /// Whether this tool applies to every file regardless of classification
    /// (the `contents`, `metadata`, `git_blame`, `git_log` special tools).
    pub universal: bool,
}

impl ToolDescriptor {
    pub fn argv_for(&self, absolute_path: &std::path::Path) -> Vec<String> {
        self.argv_template.iter().map(|arg| arg.replace("{path}", &absolute_path.display().to_string())).collect()
    }
}

/// One (path, tool) analysis outcome.
#[derive(Debug, Clone)]
pub struct Result {
    pub path: RepoPath,
    pub tool_name: String,
    pub snapshot_key: SnapshotKey,
    pub status: Status,
    pub body: StyledText,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

/// A location the persisted body can be fetched from: held in memory,
/// or known to live on disk in the result cache (loaded on demand).
#[derive(Debug, Clone)]
pub enum ResultHandle {
    InMemory(StyledText),
    OnDisk,
    /// Status is not terminal; no body applies (invariant 4).
    None,
}

/// One (path, tool) slot in a Row.
#[derive(Debug, Clone)]
pub struct Entry {
    pub descriptor_name: String,
    pub snapshot_key: SnapshotKey,
    pub status: Status,
    pub result_handle: ResultHandle,
}

impl Entry {
    pub fn pending(descriptor_name: impl Into<String>, snapshot_key: SnapshotKey) -> Self {
        Self { descriptor_name: descriptor_name.into(), snapshot_key, status: Status::Pending, result_handle: ResultHandle::None }
    }

    /// Invariant 3: if the file changed since the Entry was created and
    /// the status is not Running, the status must become Pending.
    pub fn invalidate_if_stale(&mut self, snapshot: &FileSnapshot) {
        if self.status == Status::Running {
            return;
        }
        if !self.snapshot_key.matches_snapshot(snapshot) {
            self.status = Status::Pending;
            self.result_handle = ResultHandle::None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    ByTypeDir,
    ByDirType,
}

/// One file's worth of entries.
#[derive(Debug, Clone)]
pub struct Row {
    pub path: RepoPath,
    pub snapshot: FileSnapshot,
    pub entries: Vec<Entry>,
}

impl Row {
    pub fn entry_mut(&mut self, descriptor_name: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.descriptor_name == descriptor_name)
    }

    /// Sort key for `ByTypeDir`: (extension, directory, file name).
    pub fn sort_key_by_type(&self) -> (String, String, String) {
        (self.path.extension().unwrap_or_default(), self.path.dir().to_string(), self.path.file_name().to_string())
    }

    /// Sort key for `ByDirType`: (directory, extension, file name).
    pub fn sort_key_by_dir(&self) -> (String, String, String) {
        (self.path.dir().to_string(), self.path.extension().unwrap_or_default(), self.path.file_name().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Summary,
    Result,
}

/// The whole application state rendered by the Presenter.
#[derive(Debug, Clone)]
pub struct Model {
    pub rows: Vec<Row>,
    pub cursor: (usize, usize),
    pub focus_pane: Pane,
    pub sort: SortOrder,
    pub orientation: Orientation,
    pub log_visible: bool,
    pub fullscreen: bool,
    pub help_visible: bool,
    pub paused: bool,
}

impl Model {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            cursor: (0, 0),
            focus_pane: Pane::Summary,
            sort: SortOrder::ByTypeDir,
            orientation: Orientation::Landscape,
            log_visible: false,
            fullscreen: false,
            help_visible: false,
            paused: false,
        }
    }

    /// Row indices sorted by the current `sort` order.
    pub fn sorted_row_indices(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.rows.len()).collect();
        match self.sort {
            SortOrder::ByTypeDir => idx.sort_by_key(|&i| self.rows[i].sort_key_by_type()),
            SortOrder::ByDirType => idx.sort_by_key(|&i| self.rows[i].sort_key_by_dir()),
        }
        idx
    }

    /// Clamp the cursor so it always addresses a visible cell
    /// (invariant 5). Call after every mutation that could shrink rows
    /// or a row's entry list.
    pub fn clamp_cursor(&mut self) {
        if self.rows.is_empty() {
            self.cursor = (0, 0);
            return;
        }
        let row = self.cursor.0.min(self.rows.len() - 1);
        let max_col = self.rows[row].entries.len().saturating_sub(1);
        let col = self.cursor.1.min(max_col);
        self.cursor = (row, col);
    }

    pub fn focused_entry(&self) -> Option<(&Row, &Entry)> {
        let (row_idx, col_idx) = self.cursor;
        let row = self.rows.get(row_idx)?;
        let entry = row.entries.get(col_idx)?;
        Some((row, entry))
    }

    /// The cursor's position on the rendered summary grid: its visual
    /// row under the current sort order, not its index into `rows`.
    pub fn focused_grid_position(&self) -> Option<(usize, usize)> {
        let (row_idx, col_idx) = self.cursor;
        if row_idx >= self.rows.len() {
            return None;
        }
        let visual_row = self.sorted_row_indices().iter().position(|&i| i == row_idx)?;
        Some((visual_row, col_idx))
    }

    /// `(path, tool_name)`'s position on the rendered summary grid, used
    /// to score the `Proximity` job tier by Manhattan distance.
    pub fn grid_position_of(&self, path: &crate::path::RepoPath, tool_name: &str) -> Option<(usize, usize)> {
        let row_idx = self.rows.iter().position(|r| &r.path == path)?;
        let col_idx = self.rows[row_idx].entries.iter().position(|e| e.descriptor_name == tool_name)?;
        let visual_row = self.sorted_row_indices().iter().position(|&i| i == row_idx)?;
        Some((visual_row, col_idx))
    }

    /// Next Entry whose status is an issue ({Problem, TimedOut, Error}),
    /// scanning in row-major order with wraparound. `same_tool` restricts
    /// the search to entries for the given descriptor name.
    pub fn next_issue(&self, same_tool: Option<&str>) -> Option<(usize, usize)> {
        let total_rows = self.rows.len();
        if total_rows == 0 {
            return None;
        }
        let (start_row, start_col) = self.cursor;
        let mut row = start_row;
        let mut col = start_col + 1;
        for _ in 0..=total_rows {
            let entries = &self.rows[row].entries;
            while col < entries.len() {
                let e = &entries[col];
                let matches_tool = same_tool.is_none_or(|t| e.descriptor_name == t);
                if e.status.is_issue() && matches_tool {
                    return Some((row, col));
                }
                col += 1;
            }
            row = (row + 1) % total_rows;
            col = 0;
        }
        None
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
