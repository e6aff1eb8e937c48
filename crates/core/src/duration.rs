//! Duration literals for parameters.
//!
//! A duration is a possibly signed sequence of decimal numbers, each with an
//! optional fraction and a unit suffix, such as `300ms`, `-1.5h` or `2h45m`.
//! Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
//!
//! ```
//! use taskflow_core::duration::{format_duration, parse_duration};
//!
//! let d = parse_duration("1h30m").unwrap();
//! assert_eq!(d, chrono::Duration::minutes(90));
//! assert_eq!(format_duration(d), "1h30m0s");
//! ```

use chrono::Duration;
use thiserror::Error;

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// Errors that can occur when parsing durations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    /// Empty duration string.
    #[error("empty duration string")]
    Empty,

    /// Invalid format.
    #[error("invalid duration format: {0}")]
    InvalidFormat(String),

    /// Missing unit after a number.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// Unknown unit.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    /// Value does not fit into 64-bit nanoseconds.
    #[error("duration out of range: {0:?}")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        // U+00B5 micro sign and U+03BC greek small letter mu
        "us" | "\u{00b5}s" | "\u{03bc}s" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Consume leading ASCII digits as an integer, failing on overflow.
fn leading_int(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    for b in s[..end].bytes() {
        value = value.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
        if value > 1 << 63 {
            return None;
        }
    }
    Some((value, &s[end..]))
}

/// Consume leading ASCII digits as a fraction. Digits past the precision of
/// a `u64` are consumed but ignored.
fn leading_fraction(s: &str) -> (u64, f64, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    let mut scale = 1.0;
    let mut overflowed = false;
    for b in s[..end].bytes() {
        if overflowed {
            continue;
        }
        match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
        {
            Some(v) if v <= 1 << 63 => {
                value = v;
                scale *= 10.0;
            }
            _ => overflowed = true,
        }
    }
    (value, scale, &s[end..])
}

/// Parse a duration literal into a signed [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let overflow = || DurationParseError::Overflow(input.to_string());

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(Duration::zero());
    }
    if s.is_empty() {
        return Err(if input.is_empty() {
            DurationParseError::Empty
        } else {
            DurationParseError::InvalidFormat(input.to_string())
        });
    }

    let mut total: u64 = 0;
    while !s.is_empty() {
        if !s.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return Err(DurationParseError::InvalidFormat(input.to_string()));
        }

        let before = s.len();
        let (whole, rest) = leading_int(s).ok_or_else(overflow)?;
        let had_whole = rest.len() != before;
        s = rest;

        let mut fraction = 0;
        let mut scale = 1.0;
        let mut had_fraction = false;
        if let Some(rest) = s.strip_prefix('.') {
            let before = rest.len();
            let (f, sc, rest) = leading_fraction(rest);
            fraction = f;
            scale = sc;
            had_fraction = rest.len() != before;
            s = rest;
        }
        if !had_whole && !had_fraction {
            return Err(DurationParseError::InvalidFormat(input.to_string()));
        }

        let unit_end = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        if unit_end == 0 {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let unit = &s[..unit_end];
        s = &s[unit_end..];
        let nanos = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let mut value = whole.checked_mul(nanos).ok_or_else(overflow)?;
        if value > 1 << 63 {
            return Err(overflow());
        }
        if fraction > 0 {
            let extra = (fraction as f64 * (nanos as f64 / scale)) as u64;
            value = value.checked_add(extra).ok_or_else(overflow)?;
            if value > 1 << 63 {
                return Err(overflow());
            }
        }
        total = total.checked_add(value).ok_or_else(overflow)?;
        if total > 1 << 63 {
            return Err(overflow());
        }
    }

    let nanos = if negative {
        0i64.checked_sub_unsigned(total).ok_or_else(overflow)?
    } else {
        i64::try_from(total).map_err(|_| overflow())?
    };
    Ok(Duration::nanoseconds(nanos))
}

/// Split `value` into its whole part and a `.ddd` fraction of `precision`
/// digits with trailing zeros removed.
fn split_fraction(value: u64, precision: u32) -> (u64, String) {
    if precision == 0 {
        return (value, String::new());
    }
    let divisor = 10u64.pow(precision);
    let fraction = value % divisor;
    if fraction == 0 {
        return (value / divisor, String::new());
    }
    let digits = format!("{:0width$}", fraction, width = precision as usize);
    (value / divisor, format!(".{}", digits.trim_end_matches('0')))
}

/// Format a duration the way it is accepted by [`parse_duration`], using the
/// largest units: `1h30m0s`, `1.5s`, `300ms`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.num_nanoseconds().unwrap_or(if duration < Duration::zero() {
        i64::MIN
    } else {
        i64::MAX
    });
    if nanos == 0 {
        return "0s".to_string();
    }

    let magnitude = nanos.unsigned_abs();
    let mut out = String::new();
    if nanos < 0 {
        out.push('-');
    }

    if magnitude < SECOND {
        let (precision, unit) = if magnitude < MICROSECOND {
            (0, "ns")
        } else if magnitude < MILLISECOND {
            (3, "\u{00b5}s")
        } else {
            (6, "ms")
        };
        let (whole, fraction) = split_fraction(magnitude, precision);
        out.push_str(&format!("{whole}{fraction}{unit}"));
        return out;
    }

    let (seconds, fraction) = split_fraction(magnitude, 9);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        out.push_str(&format!("{}h{}m", hours, minutes % 60));
    } else if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}{}s", seconds % 60, fraction));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::milliseconds(300));
        assert_eq!(parse_duration("2h45m").unwrap(), Duration::minutes(165));
        assert_eq!(parse_duration("10us").unwrap(), Duration::microseconds(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::microseconds(10));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::nanoseconds(7));
        assert_eq!(parse_duration("0").unwrap(), Duration::zero());
    }

    #[test]
    fn test_parse_signed_and_fractional() {
        assert_eq!(parse_duration("-1.5h").unwrap(), Duration::minutes(-90));
        assert_eq!(parse_duration("+.5s").unwrap(), Duration::milliseconds(500));
        assert_eq!(parse_duration("1.s").unwrap(), Duration::seconds(1));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
        assert!(matches!(
            parse_duration("-"),
            Err(DurationParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationParseError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_duration("3d"),
            Err(DurationParseError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_duration(".s"),
            Err(DurationParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_duration("9999999999h"),
            Err(DurationParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::zero()), "0s");
        assert_eq!(format_duration(Duration::minutes(90)), "1h30m0s");
        assert_eq!(format_duration(Duration::milliseconds(1500)), "1.5s");
        assert_eq!(format_duration(Duration::milliseconds(300)), "300ms");
        assert_eq!(format_duration(Duration::microseconds(-2)), "-2µs");
        assert_eq!(format_duration(Duration::nanoseconds(42)), "42ns");
        assert_eq!(format_duration(Duration::seconds(61)), "1m1s");
    }

    #[test]
    fn test_format_parses_back() {
        for text in ["1h2m3.5s", "-4m0.001s", "250ms"] {
            let parsed = parse_duration(text).unwrap();
            assert_eq!(parse_duration(&format_duration(parsed)).unwrap(), parsed);
        }
    }
}
