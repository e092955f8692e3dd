//! Time handling utilities for profile timestamps and inventory records.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Output format for timestamps: second precision, `Z` suffix.
pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a UTC instant as ISO 8601 with a `Z` suffix and no sub-seconds.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use vpts_common::to_iso8601;
///
/// let ts = Utc.with_ymd_and_hms(2021, 1, 1, 4, 0, 0).unwrap();
/// assert_eq!(to_iso8601(&ts), "2021-01-01T04:00:00Z");
/// ```
pub fn to_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(ISO8601_FORMAT).to_string()
}

/// Parse a last-modified style timestamp.
///
/// Accepts RFC 3339 (`2023-03-12T10:11:12.000Z`), a space separated
/// variant with offset (`2023-03-12 10:11:12+00:00`) and naive
/// datetimes, which are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Error parsing a timestamp.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_with_millis() {
        let dt = parse_timestamp("2023-03-12T10:11:12.000Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 3, 12, 10, 11, 12).unwrap());
    }

    #[test]
    fn test_parse_space_separated_offset() {
        let dt = parse_timestamp("2023-03-12 10:11:12+01:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 3, 12, 9, 11, 12).unwrap());
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let dt = parse_timestamp("2023-03-12T10:11:12").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 3, 12, 10, 11, 12).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_iso8601_drops_subseconds() {
        let ts = Utc.with_ymd_and_hms(2023, 3, 12, 0, 5, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(to_iso8601(&ts), "2023-03-12T00:05:00Z");
    }
}
