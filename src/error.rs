//! Error types for the gaze tracking service.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed protocol input (bad JSON line, missing field)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Command is illegal in the current service state
    #[error("State error: {0}")]
    State(String),

    /// Measurement source open or read failure
    #[error("Resource error: {0}")]
    Resource(String),

    /// Model loading, saving, or prediction error
    #[error("Model error: {0}")]
    Model(String),

    /// Too few accepted calibration samples to train
    #[error("Insufficient calibration samples: got {got}, need at least {needed}")]
    InsufficientSamples {
        /// Samples actually accepted
        got: usize,
        /// Minimum required
        needed: usize,
    },

    /// Calibration aborted by the operator
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    Filter(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
