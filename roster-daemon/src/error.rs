use thiserror::Error;

use roster_sync::SyncError;

/// Error surface for the scheduler and its runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {what}: {source}")]
    Io {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The managed subtree could not be prepared; the process must exit.
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[source] SyncError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(what: &'static str, source: std::io::Error) -> DaemonError {
    DaemonError::Io { what, source }
}
