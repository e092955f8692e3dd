//! Error types shared by the VPTS crates.

use thiserror::Error;

/// Result type alias using VptsError.
pub type VptsResult<T> = Result<T, VptsError>;

/// Primary error type for path, time and storage operations.
#[derive(Debug, Error)]
pub enum VptsError {
    // === Path Errors ===
    #[error("Invalid ODIM file path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    // === Storage Errors ===
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl VptsError {
    /// Stable taxonomy tag for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            VptsError::InvalidPath { .. } => "invalid_path",
            VptsError::InvalidTime(_) => "invalid_time",
            VptsError::NotFound(_) => "vanished_source",
            VptsError::StorageError(_) => "storage",
            VptsError::InternalError(_) => "internal",
        }
    }

    /// True when the error means the object is gone, not that storage failed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VptsError::NotFound(_))
    }
}

// Conversion from common error types
impl From<std::io::Error> for VptsError {
    fn from(err: std::io::Error) -> Self {
        VptsError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for VptsError {
    fn from(err: serde_json::Error) -> Self {
        VptsError::InternalError(format!("JSON error: {}", err))
    }
}
