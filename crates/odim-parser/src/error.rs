//! Error types for ODIM parsing operations.

use thiserror::Error;

/// Result type for ODIM parser operations.
pub type OdimResult<T> = Result<T, OdimError>;

/// Error types for ODIM parsing.
#[derive(Error, Debug)]
pub enum OdimError {
    /// The container could not be opened at all
    #[error("Unreadable ODIM container '{path}': {message}")]
    Unreadable { path: String, message: String },

    /// Required root metadata groups are absent
    #[error("Invalid ODIM source: {0}")]
    InvalidSource(String),

    /// Well-formed container holding something other than a vertical profile
    #[error("Incorrect what.object value: expected VP, found {found}")]
    NotVerticalProfile { found: String },

    #[error("Missing attribute '{name}' in group '{group}'")]
    MissingAttribute { group: String, name: String },

    #[error("Invalid attribute '{name}' in group '{group}': {message}")]
    InvalidAttribute {
        group: String,
        name: String,
        message: String,
    },

    /// A group or dataset exists but could not be read
    #[error("Failed to read '{location}': {message}")]
    Decode { location: String, message: String },

    #[error("Quantity '{quantity}' has {found} values, expected {expected} (one per level)")]
    LengthMismatch {
        quantity: String,
        expected: usize,
        found: usize,
    },

    #[error("No data group with quantity '{0}' found")]
    MissingHeight(String),

    #[error("Height level {index} holds a sentinel instead of a value")]
    InvalidLevel { index: usize },

    #[error("Quantity '{0}' appears in more than one data group")]
    DuplicateQuantity(String),

    #[error("Source reference must not be empty")]
    EmptySourceReference,

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OdimError {
    /// Stable taxonomy tag, separating "not applicable" from "corrupt".
    pub fn code(&self) -> &'static str {
        match self {
            OdimError::Unreadable { .. } => "unreadable_container",
            OdimError::InvalidSource(_) => "invalid_source",
            OdimError::NotVerticalProfile { .. } => "not_vertical_profile",
            OdimError::IoError(_) => "io",
            _ => "decode",
        }
    }

    pub(crate) fn missing(group: &str, name: &str) -> Self {
        OdimError::MissingAttribute {
            group: group.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn invalid(group: &str, name: &str, message: impl Into<String>) -> Self {
        OdimError::InvalidAttribute {
            group: group.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }
}
