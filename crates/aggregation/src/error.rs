//! Error types for the aggregation crate.

use thiserror::Error;

use vpts_common::VptsError;
use vpts_csv::VptsCsvError;

/// Errors that can occur while diffing inventories or aggregating groups.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error(transparent)]
    Storage(#[from] VptsError),

    #[error(transparent)]
    Conversion(#[from] VptsCsvError),

    #[error("Failed to convert {key}: {source}")]
    File {
        key: String,
        #[source]
        source: VptsCsvError,
    },

    #[error("Invalid manifest {key}: {message}")]
    Manifest { key: String, message: String },

    #[error("Failed to read inventory listing {key}: {message}")]
    Listing { key: String, message: String },

    #[error("No convertible files in group {0}")]
    EmptyGroup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl AggregationError {
    /// Stable taxonomy tag for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            AggregationError::Storage(e) => e.code(),
            AggregationError::Conversion(e) => e.code(),
            AggregationError::File { source, .. } => source.code(),
            AggregationError::Manifest { .. } | AggregationError::Listing { .. } => "manifest",
            AggregationError::EmptyGroup(_) => "empty_group",
            AggregationError::InvalidConfig(_) => "invalid_config",
            AggregationError::Csv(_) => "serialization",
            AggregationError::Io(_) => "io",
            AggregationError::Task(_) => "internal",
        }
    }
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregationError>;
