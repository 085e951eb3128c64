//! Error types for the rate limiter crate.

use std::time::Duration;
use thiserror::Error;

/// Main error type for limiter construction and admission helpers.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// The configured rate is zero, negative or does not fit the pool size.
    #[error("Invalid rate {0}: must be a positive number of operations per second")]
    InvalidRate(i64),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A limiter with a background task was built outside a tokio runtime
    #[error("No tokio runtime available to run the refill task")]
    NoRuntime,

    /// Admission was not granted before the caller's deadline
    #[error("Admission not granted within {0:?}")]
    Timeout(Duration),

    /// The caller gave up waiting for admission
    #[error("Admission cancelled by caller")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
