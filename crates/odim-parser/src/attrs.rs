//! Flattened ODIM attribute values.

use std::collections::BTreeMap;
use std::fmt;

/// Attributes of one ODIM group, keyed by name.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A single attribute value with byte strings already decoded to text.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of a scalar; numeric text is accepted as well.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Ints(v) => write!(f, "{:?}", v),
            AttrValue::Floats(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

/// Look up a numeric attribute.
pub(crate) fn require_f64(attrs: &AttrMap, group: &str, name: &str) -> crate::OdimResult<f64> {
    let value = attrs
        .get(name)
        .ok_or_else(|| crate::OdimError::missing(group, name))?;
    value
        .as_f64()
        .ok_or_else(|| crate::OdimError::invalid(group, name, format!("not a number: {}", value)))
}

/// Look up a text attribute.
pub(crate) fn require_text<'a>(
    attrs: &'a AttrMap,
    group: &str,
    name: &str,
) -> crate::OdimResult<&'a str> {
    let value = attrs
        .get(name)
        .ok_or_else(|| crate::OdimError::missing(group, name))?;
    value
        .as_text()
        .ok_or_else(|| crate::OdimError::invalid(group, name, format!("not text: {}", value)))
}
