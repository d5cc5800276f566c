//! Error types for the disk-buffering exporter.

use crate::serializer::SerializationError;
use diskbuf_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in exporter operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Buffer storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A batch could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// I/O error outside the buffer files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The wrapped exporter reported a failure.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// The exporter has been shut down.
    #[error("exporter is shut down")]
    ShutDown,

    /// The background retry worker panicked.
    #[error("retry worker panicked")]
    WorkerPanicked,
}

/// Failure carried by a [`crate::ResultCode`].
///
/// Cloneable so the same outcome can be observed by every holder of a
/// completion handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// The batch could not be serialized.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// The batch could not be buffered.
    #[error("buffering failed: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// The destination refused or failed the request.
    #[error("export rejected: {message}")]
    Rejected {
        /// Description of the failure.
        message: String,
    },

    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The exporter has been shut down.
    #[error("exporter is shut down")]
    ShutDown,
}

impl ExportError {
    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

impl From<SerializationError> for ExportError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<StorageError> for ExportError {
    fn from(e: StorageError) -> Self {
        Self::Storage {
            message: e.to_string(),
        }
    }
}

impl From<CoreError> for ExportError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Storage(e) => e.into(),
            CoreError::Io(e) => StorageError::Io(e).into(),
            CoreError::Serialization(e) => e.into(),
            CoreError::Export(e) => e,
            CoreError::ShutDown => Self::ShutDown,
            CoreError::WorkerPanicked => Self::Rejected {
                message: CoreError::WorkerPanicked.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_export_errors() {
        assert_eq!(ExportError::from(CoreError::ShutDown), ExportError::ShutDown);
        assert_eq!(
            ExportError::from(CoreError::Export(ExportError::Timeout)),
            ExportError::Timeout
        );
        assert!(matches!(
            ExportError::from(CoreError::Storage(StorageError::Closed)),
            ExportError::Storage { .. }
        ));
    }

    #[test]
    fn messages() {
        assert_eq!(
            ExportError::rejected("503").to_string(),
            "export rejected: 503"
        );
        assert_eq!(CoreError::ShutDown.to_string(), "exporter is shut down");
    }
}
