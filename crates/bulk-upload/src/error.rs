//! Error types for the upload driver.

use payload_generator::StreamError;
use thiserror::Error;

/// Errors that abort an upload run.
///
/// Individual upload failures never surface here: they fail their wave, and the
/// wave is retried.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Invalid driver configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid payload parameters.
    #[error("Payload error: {0}")]
    Payload(#[from] StreamError),

    /// The record source could not be opened or read.
    #[error("Record source error: {0:#}")]
    Source(anyhow::Error),

    /// A bounded retry policy ran out of attempts.
    #[error("Giving up after {attempts} consecutive failed waves: {cause}")]
    RetriesExhausted { attempts: u32, cause: String },
}
