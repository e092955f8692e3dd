//! Sentinel-aware decoding of raw ODIM samples.
//!
//! Sentinel codes are matched against the raw stored value, before any
//! scaling. Everything else becomes `gain * raw + offset`, kept in the
//! integer category when the input and the coefficients are integral.

use crate::attrs::{require_f64, AttrMap};
use crate::error::OdimResult;

/// Raw sample array as stored in the container.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    Integer(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl RawSamples {
    pub fn len(&self) -> usize {
        match self {
            RawSamples::Integer(v) => v.len(),
            RawSamples::Float32(v) => v.len(),
            RawSamples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    F32(f32),
    F64(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::F32(v) => *v as f64,
            Number::F64(v) => *v,
        }
    }
}

/// One element of a decoded variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileValue {
    Value(Number),
    NoData,
    Undetect,
}

impl ProfileValue {
    pub fn number(&self) -> Option<Number> {
        match self {
            ProfileValue::Value(n) => Some(*n),
            _ => None,
        }
    }
}

/// Per-variable coding read from a data group's `what` attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleCoding {
    pub nodata: f64,
    pub undetect: f64,
    pub gain: f64,
    pub offset: f64,
}

impl SampleCoding {
    pub fn new(nodata: f64, undetect: f64) -> Self {
        Self {
            nodata,
            undetect,
            gain: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_scale(mut self, gain: f64, offset: f64) -> Self {
        self.gain = gain;
        self.offset = offset;
        self
    }

    /// Read `nodata`/`undetect` (required) and `gain`/`offset` (optional).
    pub fn from_attrs(attrs: &AttrMap, group: &str) -> OdimResult<Self> {
        let nodata = require_f64(attrs, group, "nodata")?;
        let undetect = require_f64(attrs, group, "undetect")?;
        let gain = match attrs.get("gain") {
            Some(_) => require_f64(attrs, group, "gain")?,
            None => 1.0,
        };
        let offset = match attrs.get("offset") {
            Some(_) => require_f64(attrs, group, "offset")?,
            None => 0.0,
        };
        Ok(Self::new(nodata, undetect).with_scale(gain, offset))
    }

    fn is_identity(&self) -> bool {
        self.gain == 1.0 && self.offset == 0.0
    }

    fn classify(&self, raw: f64) -> Option<ProfileValue> {
        if same_code(raw, self.nodata) {
            Some(ProfileValue::NoData)
        } else if same_code(raw, self.undetect) {
            Some(ProfileValue::Undetect)
        } else {
            None
        }
    }
}

fn same_code(raw: f64, code: f64) -> bool {
    raw == code || (raw.is_nan() && code.is_nan())
}

/// Decode a raw sample array into physical values and sentinel markers.
pub fn decode(raw: &RawSamples, coding: &SampleCoding) -> Vec<ProfileValue> {
    match raw {
        RawSamples::Integer(values) => {
            let integral = coding.gain.fract() == 0.0 && coding.offset.fract() == 0.0;
            values
                .iter()
                .map(|&v| {
                    coding.classify(v as f64).unwrap_or_else(|| {
                        if integral {
                            ProfileValue::Value(Number::Int(
                                v * coding.gain as i64 + coding.offset as i64,
                            ))
                        } else {
                            ProfileValue::Value(Number::F64(
                                v as f64 * coding.gain + coding.offset,
                            ))
                        }
                    })
                })
                .collect()
        }
        RawSamples::Float32(values) => values
            .iter()
            .map(|&v| {
                coding.classify(v as f64).unwrap_or_else(|| {
                    if coding.is_identity() {
                        ProfileValue::Value(Number::F32(v))
                    } else {
                        ProfileValue::Value(Number::F32(
                            (v as f64 * coding.gain + coding.offset) as f32,
                        ))
                    }
                })
            })
            .collect(),
        RawSamples::Float64(values) => values
            .iter()
            .map(|&v| {
                coding
                    .classify(v)
                    .unwrap_or(ProfileValue::Value(Number::F64(v * coding.gain + coding.offset)))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrValue;

    #[test]
    fn test_sentinels_replaced_on_raw_value() {
        let coding = SampleCoding::new(-9999.0, -9000.0).with_scale(2.0, 1.0);
        let decoded = decode(&RawSamples::Float64(vec![-9999.0, -9000.0, 3.0]), &coding);
        assert_eq!(
            decoded,
            vec![
                ProfileValue::NoData,
                ProfileValue::Undetect,
                ProfileValue::Value(Number::F64(7.0)),
            ]
        );
    }

    #[test]
    fn test_scaled_value_hitting_sentinel_is_kept() {
        // 2 * -5000 + 1 == -9999 but the raw value is not the sentinel
        let coding = SampleCoding::new(-9999.0, -9000.0).with_scale(2.0, 1.0);
        let decoded = decode(&RawSamples::Integer(vec![-5000]), &coding);
        assert_eq!(decoded, vec![ProfileValue::Value(Number::Int(-9999))]);
    }

    #[test]
    fn test_integer_stays_integer_with_integral_scale() {
        let coding = SampleCoding::new(-1.0, -2.0).with_scale(10.0, 5.0);
        let decoded = decode(&RawSamples::Integer(vec![0, 3]), &coding);
        assert_eq!(
            decoded,
            vec![
                ProfileValue::Value(Number::Int(5)),
                ProfileValue::Value(Number::Int(35)),
            ]
        );
    }

    #[test]
    fn test_integer_with_fractional_gain_becomes_float() {
        let coding = SampleCoding::new(-1.0, -2.0).with_scale(0.5, 0.0);
        let decoded = decode(&RawSamples::Integer(vec![3]), &coding);
        assert_eq!(decoded, vec![ProfileValue::Value(Number::F64(1.5))]);
    }

    #[test]
    fn test_float32_identity_is_bit_exact() {
        let coding = SampleCoding::new(-9999.0, -9000.0);
        let decoded = decode(&RawSamples::Float32(vec![3.7_f32]), &coding);
        assert_eq!(decoded, vec![ProfileValue::Value(Number::F32(3.7_f32))]);
    }

    #[test]
    fn test_nan_sentinel() {
        let coding = SampleCoding::new(f64::NAN, -9000.0);
        let decoded = decode(&RawSamples::Float64(vec![f64::NAN, 1.0]), &coding);
        assert_eq!(decoded[0], ProfileValue::NoData);
        assert_eq!(decoded[1], ProfileValue::Value(Number::F64(1.0)));
    }

    #[test]
    fn test_coding_from_attrs() {
        let mut attrs = AttrMap::new();
        attrs.insert("nodata".into(), AttrValue::Float(-9999.0));
        attrs.insert("undetect".into(), AttrValue::Int(-9000));
        let coding = SampleCoding::from_attrs(&attrs, "dataset1/data1/what").unwrap();
        assert_eq!(coding, SampleCoding::new(-9999.0, -9000.0));

        attrs.remove("undetect");
        let err = SampleCoding::from_attrs(&attrs, "dataset1/data1/what").unwrap_err();
        assert!(matches!(err, crate::OdimError::MissingAttribute { .. }));

        attrs.insert("undetect".into(), AttrValue::Text("n/a".into()));
        let err = SampleCoding::from_attrs(&attrs, "dataset1/data1/what").unwrap_err();
        assert!(matches!(err, crate::OdimError::InvalidAttribute { .. }));
    }
}
