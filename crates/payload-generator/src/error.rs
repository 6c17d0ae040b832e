//! Error types for synthetic payload streams.

use thiserror::Error;

/// Errors raised by `StreamSpec` construction and `SyntheticStream` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Invalid construction parameters (e.g. a zero target size).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Seek target or buffer bounds outside the valid range.
    #[error("Range error: {0}")]
    Range(String),

    /// Bytes that do not form a bitmap header this crate understands.
    #[error("Invalid bitmap header: {0}")]
    InvalidHeader(String),

    /// The stream is read-only.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl From<StreamError> for std::io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match err {
            StreamError::Configuration(_) | StreamError::Range(_) => {
                std::io::ErrorKind::InvalidInput
            }
            StreamError::InvalidHeader(_) => std::io::ErrorKind::InvalidData,
            StreamError::Unsupported(_) => std::io::ErrorKind::Unsupported,
        };
        std::io::Error::new(kind, err)
    }
}
