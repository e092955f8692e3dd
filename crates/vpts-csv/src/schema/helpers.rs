//! Conversion helpers shared by schema versions.

use odim_parser::{AttrMap, AttrValue, BirdProfile, ProfileValue};

use crate::error::{Result, VptsCsvError};
use crate::format::{format_f64, format_number};

pub use vpts_common::to_iso8601 as datetime_to_proper8601;

/// Render a decoded variable with the schema's sentinel tokens.
pub fn values_to_strings(values: &[ProfileValue], nodata: &str, undetect: &str) -> Vec<String> {
    values
        .iter()
        .map(|value| match value {
            ProfileValue::Value(n) => format_number(n),
            ProfileValue::NoData => nodata.to_string(),
            ProfileValue::Undetect => undetect.to_string(),
        })
        .collect()
}

/// Encode a 1/0 flag as `TRUE`/`FALSE`.
///
/// Sentinels keep their tokens; any other number is an error.
pub fn number_to_bool_str(
    column: &str,
    values: &[ProfileValue],
    nodata: &str,
    undetect: &str,
) -> Result<Vec<String>> {
    values
        .iter()
        .map(|value| match value {
            ProfileValue::Value(n) if n.as_f64() == 1.0 => Ok("TRUE".to_string()),
            ProfileValue::Value(n) if n.as_f64() == 0.0 => Ok("FALSE".to_string()),
            ProfileValue::Value(n) => Err(VptsCsvError::InvalidValue {
                column: column.to_string(),
                message: format!("expected 0 or 1, found {}", format_number(n)),
            }),
            ProfileValue::NoData => Ok(nodata.to_string()),
            ProfileValue::Undetect => Ok(undetect.to_string()),
        })
        .collect()
}

/// Integer-format an enumeration code, with `0` and `"NULL"` meaning no data.
///
/// `0` never denotes a real volume coverage pattern.
pub fn int_to_nodata(column: &str, value: &AttrValue, nodata: &str) -> Result<String> {
    let invalid = || VptsCsvError::InvalidValue {
        column: column.to_string(),
        message: format!("'{}' is not an integer", value),
    };
    match value {
        AttrValue::Int(0) => Ok(nodata.to_string()),
        AttrValue::Int(v) => Ok(v.to_string()),
        AttrValue::Float(v) if *v == 0.0 => Ok(nodata.to_string()),
        AttrValue::Float(v) if v.fract() == 0.0 => Ok((*v as i64).to_string()),
        AttrValue::Text(s) => match s.trim() {
            "NULL" | "0" => Ok(nodata.to_string()),
            other => other
                .parse::<i64>()
                .map(|v| v.to_string())
                .map_err(|_| invalid()),
        },
        _ => Err(invalid()),
    }
}

/// Check a provenance reference: non-empty, not starting with `.`, `/` or
/// `~`, no `..` anywhere and a single line.
pub fn check_source_file(reference: &str) -> Result<&str> {
    let valid = match reference.chars().next() {
        Some(first) => {
            !matches!(first, '.' | '/' | '~')
                && !reference.contains("..")
                && !reference.contains('\n')
        }
        None => false,
    };
    if valid {
        Ok(reference)
    } else {
        Err(VptsCsvError::InvalidSourceReference(reference.to_string()))
    }
}

pub(crate) fn variable<'a>(profile: &'a BirdProfile, name: &str) -> Result<&'a [ProfileValue]> {
    profile
        .variable(name)
        .ok_or_else(|| VptsCsvError::MissingVariable(name.to_string()))
}

pub(crate) fn attr<'a>(attrs: &'a AttrMap, group: &str, name: &str) -> Result<&'a AttrValue> {
    attrs.get(name).ok_or_else(|| VptsCsvError::MissingAttribute {
        group: group.to_string(),
        name: name.to_string(),
    })
}

pub(crate) fn attr_f64(attrs: &AttrMap, group: &str, name: &str) -> Result<f64> {
    let value = attr(attrs, group, name)?;
    value.as_f64().ok_or_else(|| VptsCsvError::InvalidValue {
        column: format!("{}/{}", group, name),
        message: format!("'{}' is not a number", value),
    })
}

/// Scalar attribute as text; numbers use the float/int rendering.
pub(crate) fn attr_to_string(value: &AttrValue) -> String {
    match value {
        AttrValue::Float(v) => format_f64(*v),
        other => other.to_string(),
    }
}
