//! Common types and utilities shared across the VPTS crates and services.

pub mod error;
pub mod odim_path;
pub mod time;

pub use error::{VptsError, VptsResult};
pub use odim_path::{storage_url, DayGroup, FileNameParts, MonthGroup, OdimFilePath};
pub use time::{parse_timestamp, to_iso8601, TimeParseError, ISO8601_FORMAT};
