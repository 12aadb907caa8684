//! Error types for the simulated controller

use std::path::PathBuf;

use thiserror::Error;

/// Simulator specific errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid simulator option
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failed to read an image file
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an image file
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image file does not match the flash size
    #[error("{path} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
