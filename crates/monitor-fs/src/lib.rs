//! Initial scan plus live filesystem change stream over a codebase root.

pub mod error;
pub mod scan;
pub mod stat;
pub mod watch;

pub use error::FsError;
pub use scan::initial_scan;
pub use watch::{COALESCE_WINDOW, FsEvent, FsEventKind, FsSynchronizer};
