//! Parsers for the scalar literals accepted on the command line.

use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("invalid syntax")]
    Syntax,

    #[error("value out of range")]
    Range,
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

/// Underscores may only separate digits: never doubled, never trailing.
/// A leading underscore is fine since it follows the base prefix.
fn underscores_ok(digits: &str) -> bool {
    !digits.ends_with('_') && !digits.contains("__")
}

/// Parse a signed 64-bit integer. The base is inferred from the prefix:
/// `0x` hexadecimal, `0o` or a bare leading `0` octal, `0b` binary,
/// otherwise decimal. Underscores are allowed only after a base prefix.
pub fn parse_int(text: &str) -> Result<i64, LiteralError> {
    let (negative, body) = split_sign(text);

    let (radix, digits, prefixed) = if let Some(rest) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, rest, true)
    } else if let Some(rest) = body
        .strip_prefix("0b")
        .or_else(|| body.strip_prefix("0B"))
    {
        (2, rest, true)
    } else if let Some(rest) = body
        .strip_prefix("0o")
        .or_else(|| body.strip_prefix("0O"))
    {
        (8, rest, true)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..], true)
    } else {
        (10, body, false)
    };

    let digits = if digits.contains('_') {
        if !prefixed || !underscores_ok(digits) {
            return Err(LiteralError::Syntax);
        }
        digits.replace('_', "")
    } else {
        digits.to_string()
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LiteralError::Syntax);
    }

    let magnitude = u64::from_str_radix(&digits, radix).map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => LiteralError::Range,
        _ => LiteralError::Syntax,
    })?;

    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or(LiteralError::Range)
    } else {
        i64::try_from(magnitude).map_err(|_| LiteralError::Range)
    }
}

/// Parse a boolean. Only `1, t, T, TRUE, true, True` and
/// `0, f, F, FALSE, false, False` are accepted.
pub fn parse_bool(text: &str) -> Result<bool, LiteralError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(LiteralError::Syntax),
    }
}

fn parse_hex_float(body: &str) -> Result<f64, LiteralError> {
    let (mantissa, exponent) = body
        .split_once(|c| c == 'p' || c == 'P')
        .ok_or(LiteralError::Syntax)?;
    if mantissa.contains('_') && !underscores_ok(mantissa) {
        return Err(LiteralError::Syntax);
    }
    let mantissa = mantissa.replace('_', "");
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((&mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(LiteralError::Syntax);
    }

    // The value is `bits * 2^exp`. Digits that no longer fit in `bits` only
    // matter for rounding, so they are folded into `sticky`.
    let mut bits = 0u64;
    let mut exp = 0i64;
    let mut sticky = false;
    for (c, is_fraction) in whole
        .chars()
        .map(|c| (c, false))
        .chain(fraction.chars().map(|c| (c, true)))
    {
        let digit = u64::from(c.to_digit(16).ok_or(LiteralError::Syntax)?);
        if bits >> 60 == 0 {
            bits = bits * 16 + digit;
            if is_fraction {
                exp -= 4;
            }
        } else {
            sticky |= digit != 0;
            if !is_fraction {
                exp += 4;
            }
        }
    }

    let (exponent_negative, exponent_digits) = split_sign(exponent);
    if exponent_digits.is_empty() || !exponent_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(LiteralError::Syntax);
    }
    // Anything past this bound is already far outside the f64 range.
    const EXPONENT_LIMIT: i64 = 1 << 32;
    let magnitude = exponent_digits
        .parse::<i64>()
        .unwrap_or(EXPONENT_LIMIT)
        .min(EXPONENT_LIMIT);
    exp += if exponent_negative { -magnitude } else { magnitude };

    if bits == 0 {
        return Ok(0.0);
    }
    compose_f64(bits, exp, sticky)
}

/// Round `bits * 2^exp` (plus a nonzero tail below `bits` when `sticky`) to
/// the nearest f64, ties to even.
fn compose_f64(bits: u64, exp: i64, sticky: bool) -> Result<f64, LiteralError> {
    let leading = bits.leading_zeros();
    let bits = bits << leading;
    // Exponent of the most significant bit.
    let top = exp - i64::from(leading) + 63;
    if top > 1023 {
        return Err(LiteralError::Range);
    }

    // Normal numbers keep 53 significant bits, subnormals fewer.
    let kept_bits = if top >= -1022 { 53 } else { top + 1075 };
    if kept_bits < 0 {
        return Ok(0.0);
    }
    let shift = (64 - kept_bits) as u32;
    let wide = u128::from(bits);
    let mut kept = (wide >> shift) as u64;
    let rest = wide & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    if rest > half || (rest == half && (sticky || kept & 1 == 1)) {
        kept += 1;
    }

    if top < -1022 {
        // Subnormal: the encoding is the significand itself. Rounding up to
        // 2^52 lands exactly on the smallest normal encoding.
        return Ok(f64::from_bits(kept));
    }

    let mut top = top;
    if kept == 1 << 53 {
        kept >>= 1;
        top += 1;
        if top > 1023 {
            return Err(LiteralError::Range);
        }
    }
    let biased = (top + 1023) as u64;
    Ok(f64::from_bits((biased << 52) | (kept & ((1 << 52) - 1))))
}

/// Parse a 64-bit float in decimal (`1.5`, `1e-3`, `inf`, `nan`) or
/// hexadecimal-exponent form (`0x1.8p1`).
pub fn parse_float(text: &str) -> Result<f64, LiteralError> {
    let (negative, body) = split_sign(text);

    let value = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        parse_hex_float(hex)?
    } else {
        if body.is_empty() || body.starts_with(['+', '-']) {
            return Err(LiteralError::Syntax);
        }
        let parsed: f64 = body.parse().map_err(|_| LiteralError::Syntax)?;
        let is_inf_literal =
            body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity");
        if parsed.is_infinite() && !is_inf_literal {
            return Err(LiteralError::Range);
        }
        parsed
    };

    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_bases() {
        assert_eq!(parse_int("42"), Ok(42));
        assert_eq!(parse_int("-42"), Ok(-42));
        assert_eq!(parse_int("+7"), Ok(7));
        assert_eq!(parse_int("0x1F"), Ok(31));
        assert_eq!(parse_int("0b101"), Ok(5));
        assert_eq!(parse_int("0o17"), Ok(15));
        assert_eq!(parse_int("017"), Ok(15));
        assert_eq!(parse_int("0"), Ok(0));
        assert_eq!(parse_int("0x_ff_ff"), Ok(0xffff));
        assert_eq!(parse_int("-9223372036854775808"), Ok(i64::MIN));
    }

    #[test]
    fn test_parse_int_errors() {
        assert_eq!(parse_int(""), Err(LiteralError::Syntax));
        assert_eq!(parse_int("abc"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("1_000"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("0x"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("08"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("0x1__0"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("--1"), Err(LiteralError::Syntax));
        assert_eq!(parse_int("9223372036854775808"), Err(LiteralError::Range));
        assert_eq!(parse_int("0xffffffffffffffffff"), Err(LiteralError::Range));
    }

    #[test]
    fn test_parse_bool_token_set() {
        for text in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(text), Ok(true), "{text}");
        }
        for text in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(text), Ok(false), "{text}");
        }
        for text in ["", "yes", "tRUE", "on", "2"] {
            assert_eq!(parse_bool(text), Err(LiteralError::Syntax), "{text}");
        }
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("1.5"), Ok(1.5));
        assert_eq!(parse_float("-2e3"), Ok(-2000.0));
        assert_eq!(parse_float(".25"), Ok(0.25));
        assert_eq!(parse_float("0x1.8p1"), Ok(3.0));
        assert_eq!(parse_float("-0x10p-2"), Ok(-4.0));
        assert_eq!(parse_float("inf"), Ok(f64::INFINITY));
        assert!(parse_float("NaN").unwrap().is_nan());
    }

    #[test]
    fn test_parse_float_errors() {
        assert_eq!(parse_float(""), Err(LiteralError::Syntax));
        assert_eq!(parse_float("abc"), Err(LiteralError::Syntax));
        assert_eq!(parse_float("0x1.8"), Err(LiteralError::Syntax));
        assert_eq!(parse_float("1e400"), Err(LiteralError::Range));
        assert_eq!(parse_float("0x1p1024"), Err(LiteralError::Range));
        assert_eq!(parse_float("0x1p99999999999999999999"), Err(LiteralError::Range));
    }

    #[test]
    fn test_parse_hex_float_extreme_exponents() {
        assert_eq!(parse_float("0x10p-1025"), Ok(4.450147717014403e-308));
        assert_eq!(parse_float("0x0.01p1030"), Ok(4.49423283715579e307));
        assert_eq!(parse_float("0x1p-1074"), Ok(5e-324));
        assert_eq!(parse_float("0x1.fffffffffffffp1023"), Ok(f64::MAX));
        assert_eq!(parse_float("0x1p-1022"), Ok(f64::MIN_POSITIVE));
        assert_eq!(parse_float("0x1p-1076"), Ok(0.0));
        assert_eq!(parse_float("0x0p99999"), Ok(0.0));
    }

    #[test]
    fn test_parse_hex_float_rounds_to_nearest_even() {
        // 1 + 2^-53 is halfway between 1 and the next f64; ties go to even.
        assert_eq!(parse_float("0x1.00000000000008p0"), Ok(1.0));
        // Any nonzero digit past the halfway point rounds up.
        assert_eq!(
            parse_float("0x1.000000000000080000001p0"),
            Ok(1.0 + f64::EPSILON)
        );
        // 3 * 2^-1075 is halfway between two subnormals and rounds to the even one.
        assert_eq!(parse_float("0x3p-1075"), Ok(f64::from_bits(2)));
    }
}
