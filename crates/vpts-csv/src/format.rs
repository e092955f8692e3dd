//! Text rendering of numbers.
//!
//! Floats use the shortest representation that round-trips, always with a
//! decimal part (`10.0`), switching to exponent form (`1e-05`, `1.5e+16`)
//! outside `[1e-4, 1e16)`. `f32` values are rendered at `f32` precision so
//! `3.7_f32` stays `3.7`.

use odim_parser::Number;

fn exponent_form(s: String) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

fn render(fixed: String, exponent: String, value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = value.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        return exponent_form(exponent);
    }
    if fixed.contains('.') {
        fixed
    } else {
        format!("{}.0", fixed)
    }
}

pub fn format_f64(value: f64) -> String {
    render(format!("{}", value), format!("{:e}", value), value)
}

pub fn format_f32(value: f32) -> String {
    render(format!("{}", value), format!("{:e}", value), value as f64)
}

pub fn format_number(value: &Number) -> String {
    match value {
        Number::Int(v) => v.to_string(),
        Number::F32(v) => format_f32(*v),
        Number::F64(v) => format_f64(*v),
    }
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_f64() {
        assert_eq!(format_f64(10.0), "10.0");
        assert_eq!(format_f64(-0.5), "-0.5");
        assert_eq!(format_f64(0.0), "0.0");
        assert_eq!(format_f64(0.0001), "0.0001");
        assert_eq!(format_f64(0.00001), "1e-05");
        assert_eq!(format_f64(1.5e16), "1.5e+16");
        assert_eq!(format_f64(123456.789), "123456.789");
        assert_eq!(format_f64(f64::NAN), "nan");
    }

    #[test]
    fn test_format_f32_keeps_single_precision() {
        assert_eq!(format_f32(3.7), "3.7");
        assert_eq!(format_f32(0.1), "0.1");
        assert_eq!(format_f32(2.0), "2.0");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(&Number::Int(12)), "12");
        assert_eq!(format_number(&Number::F64(1.25)), "1.25");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(50.54061234, 6), 50.540612);
        assert_eq!(round_to(5.3, 6), 5.3);
        assert_eq!(format_f64(round_to(58.8628, 6)), "58.8628");
    }
}
