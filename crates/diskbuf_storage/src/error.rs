//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record can never fit in a buffer file.
    #[error("record too large: {len} bytes framed, max file size is {max}")]
    RecordTooLarge {
        /// The framed record length.
        len: u64,
        /// The configured maximum file size.
        max: u64,
    },

    /// The storage configuration is inconsistent.
    #[error("invalid storage configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the signal folder.
    #[error("buffer folder locked by another process: {}", path.display())]
    FolderLocked {
        /// The locked folder.
        path: PathBuf,
    },

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}
