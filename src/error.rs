//! Error types for proctrail.
//!
//! Field-level read failures never show up here: they degrade to sentinel
//! values inside the snapshot. Everything below is fatal to the sampling loop.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or contradictory configuration, detected before sampling starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a PID nor a process name was given.
    #[error("either --pid or --name must be specified")]
    MissingTarget,

    /// Both a PID and a process name were given.
    #[error("cannot specify both --pid and --name")]
    ConflictingTarget,

    #[error("invalid PID {0}: must be a positive integer")]
    InvalidPid(i32),

    #[error("invalid log level '{0}', expected one of off, error, warn, info, debug, trace")]
    InvalidLogLevel(String),

    /// Config file could not be read.
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed.
    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Effective config could not be rendered for --show-config.
    #[error("failed to render config: {0}")]
    Render(String),
}

/// Failure of a whole collection call.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The target process does not exist (or vanished before its name could be read).
    #[error("process not found: PID {pid} ({reason})")]
    NotFound { pid: i32, reason: String },

    /// The process table could not be enumerated.
    #[error("failed to list processes")]
    ListFailed(#[source] std::io::Error),
}

/// Failure while encoding a batch or writing it to the sink.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("write failed")]
    Io(#[from] std::io::Error),

    #[error("serialization failed")]
    Serialize(#[from] serde_json::Error),

    /// `export` was called after `close`.
    #[error("output is already closed")]
    Closed,

    /// A previous writer panicked while holding the sink lock.
    #[error("output lock poisoned")]
    Poisoned,
}

/// Failure to set up the output destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open output file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the header/prologue at open time failed.
    #[error("failed to initialise output")]
    Init(#[from] ExportError),
}

/// Top-level error surfaced by the sampling pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Collection for the named target failed.
    #[error("failed to collect metrics for {target}")]
    Collect {
        target: String,
        #[source]
        source: CollectError,
    },

    /// Writing the batch collected for the named target failed.
    #[error("failed to export metrics for {target}")]
    Export {
        target: String,
        #[source]
        source: ExportError,
    },

    /// Closing the output failed after sampling finished.
    #[error("failed to close output")]
    Close(#[source] ExportError),
}
