//! Error types for the VPTS CSV crate.

use thiserror::Error;

use odim_parser::OdimError;

/// Errors raised while mapping or converting profiles.
#[derive(Error, Debug)]
pub enum VptsCsvError {
    #[error("VPTS CSV version {0} not supported")]
    UnsupportedVersion(String),

    #[error(
        "Incorrect file description for the source file '{0}': \
         it must not start with '.', '/' or '~' nor contain '..'"
    )]
    InvalidSourceReference(String),

    #[error("Profile has no variable '{0}'")]
    MissingVariable(String),

    #[error("Profile has no attribute '{name}' in group '{group}'")]
    MissingAttribute { group: String, name: String },

    #[error("Invalid value for column '{column}': {message}")]
    InvalidValue { column: String, message: String },

    #[error("Column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Table headers differ: {0}")]
    HeaderMismatch(String),

    #[error("Cannot sort column '{column}': '{value}' is not a valid {expected}")]
    SortCast {
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to convert '{path}': {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<VptsCsvError>,
    },

    #[error(transparent)]
    Odim(#[from] OdimError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VptsCsvError {
    /// Stable taxonomy tag for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            VptsCsvError::UnsupportedVersion(_) => "unsupported_schema_version",
            VptsCsvError::InvalidSourceReference(_) => "invalid_source_reference",
            VptsCsvError::InFile { source, .. } => source.code(),
            VptsCsvError::Odim(e) => e.code(),
            VptsCsvError::Io(_) => "io",
            VptsCsvError::Csv(_) | VptsCsvError::Json(_) => "serialization",
            VptsCsvError::Internal(_) => "internal",
            _ => "mapping",
        }
    }
}

/// Result type for VPTS CSV operations.
pub type Result<T> = std::result::Result<T, VptsCsvError>;
