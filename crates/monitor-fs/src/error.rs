#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("path is not relative to the codebase root: {0}")]
    NotRelative(#[from] monitor_core::CoreError),
}
