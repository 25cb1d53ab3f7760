//! Top-level application error. Library crates surface typed
//! `thiserror` enums; this is where they get composed into the one
//! error shown to the user on fatal exit, mapped to the process exit
//! codes in the flag table. Only the handful of states the top level
//! itself distinguishes (bad invocation, unrecoverable cache
//! corruption) get their own variant; everything else collapses into
//! one `anyhow`-wrapped variant, matching the thiserror-for-libraries /
//! anyhow-for-binaries split used elsewhere in the pack.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("cache corruption could not be recovered: {0}")]
    CacheCorruption(String),

    #[error("fatal internal error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Other(e.into())
    }
}

impl From<monitor_core::CoreError> for AppError {
    fn from(e: monitor_core::CoreError) -> Self {
        AppError::Other(e.into())
    }
}

impl From<monitor_cache::CacheError> for AppError {
    fn from(e: monitor_cache::CacheError) -> Self {
        AppError::Other(e.into())
    }
}

impl From<monitor_fs::FsError> for AppError {
    fn from(e: monitor_fs::FsError) -> Self {
        AppError::Other(e.into())
    }
}

impl AppError {
    /// Exit code per the flag table: 0 clean, 1 usage, 2 unrecoverable
    /// cache corruption, 3 everything else fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) => 1,
            AppError::CacheCorruption(_) => 2,
            AppError::Fatal(_) | AppError::Other(_) => 3,
        }
    }
}
