//! Numeric literals in text form.
//!
//! Parsing turns a complete token (already split off by the tokenizer) into
//! the narrowest event that holds it exactly. Formatting produces text the
//! parser maps back to the same value.

use crate::event::number::{scientific_digits, shortest_digits};
use crate::event::{BigFloat, DecimalFloat, Event};
use crate::util::bigint::{BigInt, BigUint};

/// Decimal exponents beyond this are rejected rather than parsed.
const MAX_EXPONENT_DIGITS: usize = 9;

// =============================================================================
// PARSING
// =============================================================================

/// Removes `_` separators, which may only appear between two digits.
fn strip_separators(digits: &str, radix: u32) -> Option<String> {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len());
    for (i, c) in digits.char_indices() {
        if c == '_' {
            let before = i > 0 && char::from(bytes[i - 1]).is_digit(radix);
            let after = bytes.get(i + 1).is_some_and(|b| char::from(*b).is_digit(radix));
            if !before || !after {
                return None;
            }
        } else if c.is_digit(radix) {
            out.push(c);
        } else {
            return None;
        }
    }
    Some(out)
}

fn split_sign(token: &str) -> (bool, &str) {
    match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    }
}

/// Splits a `0x`/`0o`/`0b` prefix off, returning the radix.
fn split_radix(body: &str) -> (u32, &str) {
    let prefix = body.get(..2).map(str::to_ascii_lowercase);
    match prefix.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    }
}

/// Builds the integer event for a sign and magnitude.
///
/// Negative zero has no integer form and becomes a float.
pub fn integer_event(negative: bool, magnitude: BigUint) -> Event {
    if negative && magnitude.is_zero() {
        return Event::Float(-0.0);
    }
    match magnitude.to_u64() {
        Some(m) if !negative => Event::PositiveInt(m),
        Some(m) if m <= 1 << 63 => Event::Int((m as i64).wrapping_neg()),
        _ => Event::BigInt(BigInt::new(negative, magnitude)),
    }
}

/// Parses an integer or float literal.
pub fn parse_number(token: &str) -> Option<Event> {
    let (negative, body) = split_sign(token);
    let (radix, digits) = split_radix(body);
    match radix {
        16 if digits.contains(['p', 'P']) => parse_hex_float(negative, digits),
        10 if digits.contains(['.', 'e', 'E']) => parse_decimal_float(negative, digits),
        _ => {
            let magnitude = BigUint::parse_radix(&strip_separators(digits, radix)?, radix)?;
            Some(integer_event(negative, magnitude))
        }
    }
}

fn parse_exponent(text: &str) -> Option<i64> {
    let (negative, digits) = split_sign(text);
    let digits = strip_separators(digits, 10)?;
    if digits.is_empty() || digits.len() > MAX_EXPONENT_DIGITS {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Splits `whole[.frac]`; both sides must have digits when a point is present.
fn split_fraction(mantissa: &str, radix: u32) -> Option<(String, usize)> {
    let (whole, frac) = match mantissa.split_once('.') {
        Some((whole, frac)) if !whole.is_empty() && !frac.is_empty() => (whole, frac),
        Some(_) => return None,
        None => (mantissa, ""),
    };
    let whole = strip_separators(whole, radix)?;
    let frac = strip_separators(frac, radix)?;
    if whole.is_empty() {
        return None;
    }
    let frac_len = frac.len();
    Some((whole + &frac, frac_len))
}

fn parse_decimal_float(negative: bool, body: &str) -> Option<Event> {
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], parse_exponent(&body[i + 1..])?),
        None => (body, 0),
    };
    let (digits, frac_len) = split_fraction(mantissa, 10)?;
    let coefficient = BigUint::parse_radix(&digits, 10)?;
    let exponent = i32::try_from(exponent - frac_len as i64).ok()?;
    let value = DecimalFloat::new(negative, coefficient, exponent);
    Some(match value.as_exact_f64() {
        Some(f) => Event::Float(f),
        None => Event::DecimalFloat(value.normalized()),
    })
}

fn parse_hex_float(negative: bool, body: &str) -> Option<Event> {
    let i = body.find(['p', 'P'])?;
    let exponent = parse_exponent(&body[i + 1..])?;
    let (digits, frac_len) = split_fraction(&body[..i], 16)?;
    let significand = BigUint::parse_radix(&digits, 16)?;
    let exponent = i32::try_from(exponent - 4 * frac_len as i64).ok()?;
    let value = BigFloat::new(negative, significand, exponent);
    Some(match value.to_f64_exact() {
        Some(f) => Event::Float(f),
        None => Event::BigFloat(value),
    })
}

/// Parses an element of an integer typed array, honoring radix prefixes.
pub fn parse_array_int(token: &str, default_radix: u32) -> Option<i128> {
    let (negative, body) = split_sign(token);
    let (radix, digits) = match split_radix(body) {
        (10, digits) => (default_radix, digits),
        other => other,
    };
    let magnitude = u128::from_str_radix(&strip_separators(digits, radix)?, radix).ok()?;
    let magnitude = i128::try_from(magnitude).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parses an element of a float typed array.
pub fn parse_array_float(token: &str) -> Option<f64> {
    match token {
        "@nan" => return Some(f64::NAN),
        "@inf" => return Some(f64::INFINITY),
        "-@inf" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if !token
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-' | b'_'))
    {
        return None;
    }
    let cleaned: String = token.chars().filter(|c| *c != '_').collect();
    cleaned.parse().ok()
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Places the decimal point for `digits × 10^exponent`.
///
/// Moderate magnitudes are written positionally, the rest in scientific
/// notation. The output always reads back as a float, never an integer.
fn place_point(digits: &str, exponent: i64) -> String {
    let point = digits.len() as i64 + exponent;
    if exponent >= 0 && point <= 21 {
        format!("{}{}.0", digits, "0".repeat(exponent as usize))
    } else if exponent < 0 && point > 0 {
        let (whole, frac) = digits.split_at(point as usize);
        format!("{}.{}", whole, frac)
    } else if exponent < 0 && point > -5 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}", first, point - 1)
        } else {
            format!("{}.{}e{}", first, rest, point - 1)
        }
    }
}

fn sign(negative: bool) -> &'static str {
    if negative { "-" } else { "" }
}

/// Formats an f64, including the named forms of infinity and NaN.
pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        return "@nan".to_string();
    }
    if value.is_infinite() {
        return format!("{}@inf", sign(value < 0.0));
    }
    if value == 0.0 {
        return format!("{}0.0", sign(value.is_sign_negative()));
    }
    let (digits, exponent) = shortest_digits(value.abs());
    format!("{}{}", sign(value < 0.0), place_point(&digits, exponent))
}

/// Formats an f32 with its own shortest digits.
pub fn format_f32(value: f32) -> String {
    if value.is_nan() || value.is_infinite() || value == 0.0 {
        return format_f64(f64::from(value));
    }
    let (digits, exponent) = scientific_digits(&format!("{:e}", value.abs()));
    format!("{}{}", sign(value < 0.0), place_point(&digits, exponent))
}

pub fn format_decimal(value: &DecimalFloat) -> String {
    if value.is_zero() {
        return format!("{}0.0", sign(value.is_negative()));
    }
    let value = value.normalized();
    format!(
        "{}{}",
        sign(value.is_negative()),
        place_point(&value.coefficient().to_string(), i64::from(value.exponent()))
    )
}

/// Formats a binary float as a hex float literal, e.g. `0x1fp-3`.
pub fn format_big_float(value: &BigFloat) -> String {
    format!(
        "{}0x{}p{}",
        sign(value.is_negative()),
        value.significand().to_string_radix(16),
        value.exponent()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(parse_number("42"), Some(Event::PositiveInt(42)));
        assert_eq!(parse_number("-42"), Some(Event::Int(-42)));
        assert_eq!(parse_number("+7"), Some(Event::PositiveInt(7)));
        assert_eq!(parse_number("0xff"), Some(Event::PositiveInt(255)));
        assert_eq!(parse_number("0o17"), Some(Event::PositiveInt(15)));
        assert_eq!(parse_number("-0b101"), Some(Event::Int(-5)));
        assert_eq!(parse_number("1_000_000"), Some(Event::PositiveInt(1_000_000)));
        assert_eq!(parse_number("-0"), Some(Event::Float(-0.0)));
        assert_eq!(
            parse_number("-9223372036854775808"),
            Some(Event::Int(i64::MIN))
        );
        assert_eq!(
            parse_number("18446744073709551616"),
            Some(Event::BigInt(BigInt::new(false, BigUint::from_u128(1 << 64))))
        );
    }

    #[test]
    fn test_bad_separators() {
        assert_eq!(parse_number("1__0"), None);
        assert_eq!(parse_number("_1"), None);
        assert_eq!(parse_number("1_"), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("12a"), None);
        assert_eq!(parse_number("1."), None);
        assert_eq!(parse_number(".5"), None);
    }

    #[test]
    fn test_decimal_floats() {
        assert_eq!(parse_number("1.5"), Some(Event::Float(1.5)));
        assert_eq!(parse_number("-2.5e3"), Some(Event::Float(-2500.0)));
        assert_eq!(parse_number("1e-2"), Some(Event::Float(0.01)));
        assert_eq!(parse_number("0.0"), Some(Event::Float(0.0)));
        // More digits than any f64 carries
        let Some(Event::DecimalFloat(value)) = parse_number("1.00000000000000000000001") else {
            panic!("expected a decimal float");
        };
        assert_eq!(value.exponent(), -23);
    }

    #[test]
    fn test_hex_floats() {
        assert_eq!(parse_number("0x1.8p10"), Some(Event::Float(1536.0)));
        assert_eq!(parse_number("-0x1p-2"), Some(Event::Float(-0.25)));
        let Some(Event::BigFloat(value)) = parse_number("0x1.00000000000000000001p0") else {
            panic!("expected a big float");
        };
        assert_eq!(value.exponent(), -80);
    }

    #[test]
    fn test_array_elements() {
        assert_eq!(parse_array_int("ff", 16), Some(255));
        assert_eq!(parse_array_int("0x10", 10), Some(16));
        assert_eq!(parse_array_int("-128", 10), Some(-128));
        assert_eq!(parse_array_float("1.25"), Some(1.25));
        assert_eq!(parse_array_float("-@inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_array_float("nan"), None);
    }

    #[test]
    fn test_format_floats() {
        assert_eq!(format_f64(1.5), "1.5");
        assert_eq!(format_f64(-1200.0), "-1200.0");
        assert_eq!(format_f64(0.001), "0.001");
        assert_eq!(format_f64(1e300), "1e300");
        assert_eq!(format_f64(1.5e-10), "1.5e-10");
        assert_eq!(format_f64(-0.0), "-0.0");
        assert_eq!(format_f64(f64::NEG_INFINITY), "-@inf");
        assert_eq!(format_f32(1.1), "1.1");
    }

    #[test]
    fn test_format_parses_back() {
        for value in [1.5, -1200.0, 0.001, 1e300, 1.5e-10, 123456.789, f64::MIN_POSITIVE, f64::MAX] {
            assert_eq!(parse_number(&format_f64(value)), Some(Event::Float(value)));
        }
    }

    #[test]
    fn test_format_decimal_and_big_float() {
        let value = DecimalFloat::new(
            true,
            BigUint::parse_radix("100000000000000000000001", 10).unwrap(),
            -20,
        );
        assert_eq!(format_decimal(&value), "-1000.00000000000000000001");
        assert_eq!(parse_number(&format_decimal(&value)), Some(Event::DecimalFloat(value)));

        let value = BigFloat::new(false, BigUint::from_u64(0x1f), -3);
        assert_eq!(format_big_float(&value), "0x1fp-3");
    }
}
