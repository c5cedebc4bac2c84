//! Error types for every failure class of a monitoring run.
//!
//! Fatal classes (configuration, resolution, storage) abort the command.
//! Log-query failures never escape the correlator; they end up in the audit
//! entry instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either a process name or a pid must be given")]
    MissingSelector,

    #[error("process name and pid are mutually exclusive")]
    AmbiguousSelector,

    #[error("sampling interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("restart policy `reacquire` requires a process name")]
    ReacquireWithoutName,

    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no process with pid {0}")]
    PidNotFound(u32),

    #[error("no process named {0:?}")]
    NameNotFound(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column {0:?} in header")]
    MissingColumn(&'static str),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a log query produced no text. All variants are non-fatal.
#[derive(Debug, Error)]
pub enum LogQueryError {
    #[error("log source unavailable: {0}")]
    Unavailable(String),

    #[error("log query exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("log query timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("log queries are not supported on this platform")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("anomaly is missing {0}")]
    MissingField(&'static str),
}

/// Umbrella error for the binary.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("cannot install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("cannot start log source: {0}")]
    LogSource(std::io::Error),
}
