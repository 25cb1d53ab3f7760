use thiserror::Error;

/// Errors that can arise purely from the data-model and rendering layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("path {0:?} escapes the codebase root")]
    PathEscapesRoot(String),

    #[error("path {0:?} is not valid UTF-8")]
    NonUtf8Path(String),

    #[error("cursor position ({row}, {col}) has no corresponding cell")]
    CursorOutOfBounds { row: usize, col: usize },
}
