//! Error types for the doctree library.

use std::io;
use thiserror::Error;

/// Result type alias for doctree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while structuring or persisting documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The element stream is malformed (unknown element type, bad payload).
    #[error("invalid element stream: {0}")]
    InvalidInput(String),

    /// A write to side storage or the database failed.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// A read from side storage or the database failed.
    #[error("storage read failed: {0}")]
    StorageRead(String),

    /// Lookup by identifier found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflicting operation on the same document was already in flight.
    #[error("conflicting operation in progress for document {0}")]
    ConcurrentConflict(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::StorageWrite(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("doc-123".to_string());
        assert_eq!(err.to_string(), "not found: doc-123");

        let err = Error::ConcurrentConflict("doc-456".to_string());
        assert_eq!(
            err.to_string(),
            "conflicting operation in progress for document doc-456"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_is_invalid_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
