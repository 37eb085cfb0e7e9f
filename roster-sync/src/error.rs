//! Error types for roster-sync.

use std::path::PathBuf;

use thiserror::Error;

use roster_directory::DirectoryError;
use roster_source::SourceError;

/// Cycle-level failures. Per-user and per-entry problems never surface here;
/// they are tallied in the cycle report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching from the access-control system failed for the whole listing.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Opening or using the directory session failed outside per-entry work.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// The configured site name does not exist in the source.
    #[error("site '{name}' not found in access-control system")]
    SiteNotFound { name: String },

    /// The managed subtree could not be verified or created.
    #[error("cannot bootstrap managed subtree {dn}: {source}")]
    Bootstrap {
        dn: String,
        #[source]
        source: DirectoryError,
    },

    /// A pre-mutation snapshot failed; the cycle stops before writing.
    #[error("snapshot into {dir} failed: {source}")]
    Snapshot {
        dir: PathBuf,
        #[source]
        source: Box<SyncError>,
    },

    /// An on-demand snapshot was requested without a backup directory.
    #[error("no backup directory configured (set ROSTER_BACKUP_DIR or sync.backup_dir)")]
    BackupNotConfigured,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (snapshot record).
    #[error("snapshot record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
