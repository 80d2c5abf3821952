use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler, status store, and service management.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] todu_core::ConfigError),

    #[error("invalid sync interval '{value}': {reason}")]
    InvalidInterval { value: String, reason: String },

    #[error("daemon cancelled")]
    Cancelled,

    #[error("daemon is not running")]
    NotRunning,

    #[error("daemon has already been started")]
    AlreadyStarted,

    #[error("service is not installed (missing {path})")]
    ServiceNotInstalled { path: PathBuf },

    #[error("service management is not supported on {0}")]
    UnsupportedPlatform(String),

    #[error("{program} {args} failed: {output}")]
    Command {
        program: String,
        args: String,
        output: String,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
