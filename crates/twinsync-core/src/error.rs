//! Error taxonomy
//!
//! - [`FileError`]: a single filesystem operation failed. Retryable through
//!   [`crate::status::try_reporting_error`].
//! - [`DatabaseError`]: the sync database is missing or unusable. Never fatal;
//!   automatic mode falls back to default directions.
//! - [`SyncError::Abort`]: user cancellation, propagated through every layer.
//! - [`SyncError::Fatal`]: the run (or folder pair) cannot continue.
//! - [`SyncError::Internal`]: a broken contract between engine layers.
//!
//! Conflicts are not errors: they are a classification stored on the item.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure of a single filesystem operation
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FileError {
    message: String,
    #[source]
    source: Option<io::Error>,
}

impl FileError {
    /// Create an error with a plain message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error for an I/O failure on `path`
    #[must_use]
    pub fn io(action: &str, path: &Path, source: io::Error) -> Self {
        Self {
            message: format!("{action} \"{}\": {source}", path.display()),
            source: Some(source),
        }
    }

    /// The message shown to the user
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying I/O error kind, if any
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        self.source.as_ref().map(io::Error::kind)
    }
}

/// Sync database could not be loaded
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// No database file yet (first synchronization of this pair)
    #[error("Initial synchronization: database file \"{}\" does not yet exist", .0.display())]
    NotExisting(PathBuf),

    /// A file exists but has the wrong format, version or checksum
    #[error("Database file \"{}\" is incompatible: {reason}", path.display())]
    Incompatible {
        /// Database file location
        path: PathBuf,
        /// What did not match
        reason: String,
    },

    /// The file exists but could not be read or written
    #[error("Cannot access database file \"{}\": {source}", path.display())]
    Io {
        /// Database file location
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },
}

/// Top-level engine error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Filesystem operation failed
    #[error(transparent)]
    File(#[from] FileError),

    /// Sync database problem
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// User requested cancellation
    #[error("Operation aborted by user")]
    Abort,

    /// Condition that stops the run
    #[error("{0}")]
    Fatal(String),

    /// Contract violation between engine components
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether this error is a user abort
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// Result type alias for engine operations
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_message_contains_path() {
        let err = FileError::io(
            "Cannot read file",
            Path::new("/tmp/x.txt"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );

        assert!(err.message().contains("Cannot read file"));
        assert!(err.message().contains("/tmp/x.txt"));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_sync_error_from_file_error() {
        let err: SyncError = FileError::new("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_abort());
        assert!(SyncError::Abort.is_abort());
    }

    #[test]
    fn test_database_error_display() {
        let err = DatabaseError::Incompatible {
            path: PathBuf::from("db"),
            reason: "version 7".to_string(),
        };
        assert!(err.to_string().contains("incompatible"));
        assert!(err.to_string().contains("version 7"));
    }
}
