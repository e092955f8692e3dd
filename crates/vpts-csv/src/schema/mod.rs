//! Versioned VPTS CSV schemas.
//!
//! A schema fixes the column set and order, the sentinel tokens, the sort
//! key and the provenance rule of the output table. New versions are added
//! as a new [`SchemaVersion`] variant plus an implementation of
//! [`VptsSchema`]; callers only ever go through [`get_schema`].

pub mod helpers;
pub mod v1;

use std::fmt;
use std::str::FromStr;

use odim_parser::BirdProfile;

use crate::error::{Result, VptsCsvError};

pub use v1::VptsCsvV1;

/// Comparison type of a sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortType {
    Str,
    Int,
    Float,
}

impl SortType {
    pub fn name(&self) -> &'static str {
        match self {
            SortType::Str => "string",
            SortType::Int => "integer",
            SortType::Float => "number",
        }
    }
}

/// Values of one mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnData {
    /// One value per height level
    Series(Vec<String>),
    /// One value repeated on every row
    Scalar(String),
}

/// A named output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub data: ColumnData,
}

impl Column {
    pub fn series(name: &'static str, values: Vec<String>) -> Self {
        Self {
            name,
            data: ColumnData::Series(values),
        }
    }

    pub fn scalar(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            data: ColumnData::Scalar(value.into()),
        }
    }
}

/// Conversion rules of one VPTS CSV version.
pub trait VptsSchema: Send + Sync {
    fn version(&self) -> SchemaVersion;

    /// Token written for "no data".
    fn nodata(&self) -> &'static str;

    /// Token written for "undetect".
    fn undetect(&self) -> &'static str;

    /// Output columns, in order.
    fn columns(&self) -> &'static [&'static str];

    /// Row order: columns and the type they are compared as, in tie-break order.
    fn sort_keys(&self) -> &'static [(&'static str, SortType)];

    /// Columns identifying a measurement regardless of its source file.
    fn duplicate_keys(&self) -> &'static [&'static str];

    /// Table schema document the output conforms to.
    fn table_schema_url(&self) -> &'static str;

    /// Validate a provenance reference against the version's path rule.
    fn check_source_reference<'a>(&self, reference: &'a str) -> Result<&'a str>;

    /// Map a profile to its ordered output columns.
    fn mapping(&self, profile: &BirdProfile) -> Result<Vec<Column>>;
}

/// Known schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V1,
}

static V1: VptsCsvV1 = VptsCsvV1;

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1.0",
        }
    }

    pub fn schema(&self) -> &'static dyn VptsSchema {
        match self {
            SchemaVersion::V1 => &V1,
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = VptsCsvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v1.0" => Ok(SchemaVersion::V1),
            other => Err(VptsCsvError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the schema for a version string such as `v1.0`.
///
/// Unknown versions are an error; there is no fallback to a newer version.
pub fn get_schema(version: &str) -> Result<&'static dyn VptsSchema> {
    Ok(version.parse::<SchemaVersion>()?.schema())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_schema_v1() {
        let schema = get_schema("v1.0").unwrap();
        assert_eq!(schema.version(), SchemaVersion::V1);
        assert_eq!(schema.nodata(), "");
        assert_eq!(schema.undetect(), "NaN");
    }

    #[test]
    fn test_get_schema_unknown() {
        for version in ["v0.9", "v2.0", "1.0", "V1.0", ""] {
            let err = get_schema(version).err().unwrap();
            assert!(matches!(err, VptsCsvError::UnsupportedVersion(ref v) if v == version));
            assert_eq!(err.code(), "unsupported_schema_version");
        }
    }

    #[test]
    fn test_version_display() {
        assert_eq!(SchemaVersion::V1.to_string(), "v1.0");
    }
}
