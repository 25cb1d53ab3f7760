//! Shared data model and rendering primitives for the monitor workspace.
//!
//! This crate has no knowledge of subprocesses, the filesystem, or the
//! terminal event loop — it defines the *nouns* (`Path`, `FileSnapshot`,
//! `ToolDescriptor`, `Status`, `Entry`, `Model`) and the styled-text /
//! widget layer used to render them. Everything here is pure and
//! testable by value comparison.

pub mod error;
pub mod model;
pub mod path;
pub mod snapshot;
pub mod status;
pub mod styled_text;
pub mod widgets;

pub use error::CoreError;
pub use model::{Entry, Model, Orientation, Pane, Result as ToolResult, Row, ToolDescriptor};
pub use path::RepoPath;
pub use snapshot::{ContentDigest, FileSnapshot, SnapshotKey};
pub use status::Status;
pub use styled_text::{Style, StyledText};
