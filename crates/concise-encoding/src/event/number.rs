//! Arbitrary-precision decimal and binary floating point values.

use std::fmt;

use crate::util::bigint::BigUint;

/// Largest binary exponent magnitude converted to an exact decimal.
///
/// Converting `m × 2^-n` to decimal multiplies by `5^n`, so the cost grows
/// with the exponent. Larger values are rejected instead of converted.
pub const MAX_EXACT_CONVERSION_EXPONENT: i32 = 1 << 16;

/// Decimal float: `(-1)^negative × coefficient × 10^exponent`.
///
/// The sign is kept separately so negative zero survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalFloat {
    negative: bool,
    coefficient: BigUint,
    exponent: i32,
}

impl DecimalFloat {
    pub fn new(negative: bool, coefficient: BigUint, exponent: i32) -> Self {
        Self {
            negative,
            coefficient,
            exponent,
        }
    }

    /// Creates a decimal from a small coefficient.
    pub fn from_parts(negative: bool, coefficient: u64, exponent: i32) -> Self {
        Self::new(negative, BigUint::from_u64(coefficient), exponent)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn coefficient(&self) -> &BigUint {
        &self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    /// Returns the same value with trailing zeros moved into the exponent.
    pub fn normalized(&self) -> Self {
        let mut coefficient = self.coefficient.clone();
        let mut exponent = self.exponent;
        if coefficient.is_zero() {
            return Self::new(self.negative, coefficient, 0);
        }
        while exponent < i32::MAX {
            let mut reduced = coefficient.clone();
            if reduced.div_small(10) != 0 {
                break;
            }
            coefficient = reduced;
            exponent += 1;
        }
        Self::new(self.negative, coefficient, exponent)
    }

    /// Nearest f64 (may round, overflow to infinity or underflow to zero).
    pub fn to_f64(&self) -> f64 {
        let sign = if self.negative { "-" } else { "" };
        format!("{}{}e{}", sign, self.coefficient, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }

    /// Returns the f64 whose shortest decimal form is exactly this value.
    pub fn as_exact_f64(&self) -> Option<f64> {
        if self.coefficient.is_zero() {
            return Some(if self.negative { -0.0 } else { 0.0 });
        }
        let normalized = self.normalized();
        let value = normalized.to_f64();
        if !value.is_finite() || value == 0.0 {
            return None;
        }
        let (digits, exponent) = shortest_digits(value.abs());
        let matches = digits == normalized.coefficient.to_string()
            && exponent == i64::from(normalized.exponent);
        matches.then_some(value)
    }
}

impl fmt::Display for DecimalFloat {
    /// Scientific form, e.g. `-12345e-2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{}{}e{}", sign, self.coefficient, self.exponent)
    }
}

/// Binary float: `(-1)^negative × significand × 2^exponent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigFloat {
    negative: bool,
    significand: BigUint,
    exponent: i32,
}

impl BigFloat {
    pub fn new(negative: bool, significand: BigUint, exponent: i32) -> Self {
        Self {
            negative,
            significand,
            exponent,
        }
    }

    /// Decomposes a finite f64.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7FF) as i32;
        let mantissa = bits & ((1 << 52) - 1);
        let (significand, exponent) = if biased == 0 {
            (mantissa, -1074)
        } else {
            (mantissa | (1 << 52), biased - 1075)
        };
        Some(Self::new(negative, BigUint::from_u64(significand), exponent))
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn significand(&self) -> &BigUint {
        &self.significand
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Returns the value as an f64 if no precision is lost.
    pub fn to_f64_exact(&self) -> Option<f64> {
        if self.significand.is_zero() {
            return Some(if self.negative { -0.0 } else { 0.0 });
        }
        let mut significand = self.significand.clone();
        let shift = significand.trailing_zeros();
        significand.shr(shift);
        let exponent = i64::from(self.exponent) + shift as i64;
        let bits = significand.bits() as i64;
        if bits > 53 || exponent < -1074 || exponent + bits - 1 > 1023 {
            return None;
        }
        let magnitude = significand.to_u64()? as f64 * pow2(exponent);
        Some(if self.negative { -magnitude } else { magnitude })
    }

    /// Converts to an exactly equal decimal float.
    ///
    /// Returns `None` when the exponent magnitude exceeds
    /// [`MAX_EXACT_CONVERSION_EXPONENT`].
    pub fn to_decimal(&self) -> Option<DecimalFloat> {
        if self.exponent.unsigned_abs() > MAX_EXACT_CONVERSION_EXPONENT as u32 {
            return None;
        }
        let mut coefficient = self.significand.clone();
        if self.exponent >= 0 {
            coefficient.shl(self.exponent as u64);
            return Some(DecimalFloat::new(self.negative, coefficient, 0).normalized());
        }
        // m × 2^-n == m × 5^n × 10^-n
        for _ in 0..self.exponent.unsigned_abs() {
            coefficient.mul_small(5);
        }
        Some(DecimalFloat::new(self.negative, coefficient, self.exponent).normalized())
    }
}

/// Builds 2^exponent for exponent in [-1074, 1023].
fn pow2(exponent: i64) -> f64 {
    if exponent >= -1022 {
        f64::from_bits(((exponent + 1023) as u64) << 52)
    } else {
        f64::from_bits(1u64 << (exponent + 1074))
    }
}

/// Shortest round-trip digits of a positive finite f64.
///
/// Returns `(digits, exponent)` such that the value is `digits × 10^exponent`
/// and `digits` has no trailing zeros.
pub(crate) fn shortest_digits(value: f64) -> (String, i64) {
    scientific_digits(&format!("{:e}", value))
}

/// Splits `{:e}` output of a positive value into digits and exponent.
pub(crate) fn scientific_digits(formatted: &str) -> (String, i64) {
    let (mantissa, exp) = formatted.split_once('e').unwrap_or((formatted, "0"));
    let exp: i64 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let trimmed = digits.trim_end_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    let exponent = exp - (mantissa.split_once('.').map_or(0, |(_, frac)| frac.len()) as i64)
        + (digits.len() - trimmed.len()) as i64;
    (trimmed.to_string(), exponent)
}
