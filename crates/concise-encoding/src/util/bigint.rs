//! Arbitrary-precision integers for values that overflow 64 bits.
//!
//! Only the operations the codecs need are provided: construction from
//! little-endian bytes and digit strings, rendering in radix 10/16, small
//! multiply/add/divide for digit conversion, and bit shifts for normalizing
//! binary floats.

use std::fmt;

/// Unsigned big integer stored as little-endian u32 limbs.
///
/// The representation is normalized: there are never trailing zero limbs, so
/// zero is the empty vector and derived equality is numeric equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BigUint {
    limbs: Vec<u32>,
}

impl BigUint {
    /// Returns zero.
    pub fn zero() -> Self {
        Self { limbs: Vec::new() }
    }

    pub fn from_u64(value: u64) -> Self {
        let mut n = Self {
            limbs: vec![value as u32, (value >> 32) as u32],
        };
        n.normalize();
        n
    }

    pub fn from_u128(value: u128) -> Self {
        let mut n = Self {
            limbs: (0..4).map(|i| (value >> (32 * i)) as u32).collect(),
        };
        n.normalize();
        n
    }

    fn normalize(&mut self) {
        while self.limbs.last() == Some(&0) {
            self.limbs.pop();
        }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Returns the value as a u64 if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        match self.limbs.as_slice() {
            [] => Some(0),
            [lo] => Some(u64::from(*lo)),
            [lo, hi] => Some(u64::from(*lo) | (u64::from(*hi) << 32)),
            _ => None,
        }
    }

    /// Number of significant bits (0 for zero).
    pub fn bits(&self) -> u64 {
        match self.limbs.last() {
            None => 0,
            Some(top) => (self.limbs.len() as u64) * 32 - u64::from(top.leading_zeros()),
        }
    }

    /// Number of trailing zero bits (0 for zero).
    pub fn trailing_zeros(&self) -> u64 {
        let mut count = 0u64;
        for &limb in &self.limbs {
            if limb == 0 {
                count += 32;
            } else {
                return count + u64::from(limb.trailing_zeros());
            }
        }
        0
    }

    /// Multiplies in place by a small factor.
    pub fn mul_small(&mut self, factor: u32) {
        let mut carry = 0u64;
        for limb in &mut self.limbs {
            let product = u64::from(*limb) * u64::from(factor) + carry;
            *limb = product as u32;
            carry = product >> 32;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
        self.normalize();
    }

    /// Adds a small value in place.
    pub fn add_small(&mut self, addend: u32) {
        let mut carry = u64::from(addend);
        for limb in &mut self.limbs {
            if carry == 0 {
                break;
            }
            let sum = u64::from(*limb) + carry;
            *limb = sum as u32;
            carry = sum >> 32;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
    }

    /// Divides in place by a small non-zero divisor, returning the remainder.
    pub fn div_small(&mut self, divisor: u32) -> u32 {
        debug_assert!(divisor != 0);
        let mut rem = 0u64;
        for limb in self.limbs.iter_mut().rev() {
            let cur = (rem << 32) | u64::from(*limb);
            *limb = (cur / u64::from(divisor)) as u32;
            rem = cur % u64::from(divisor);
        }
        self.normalize();
        rem as u32
    }

    /// Shifts left in place.
    pub fn shl(&mut self, bits: u64) {
        if self.is_zero() || bits == 0 {
            return;
        }
        let limb_shift = (bits / 32) as usize;
        let bit_shift = (bits % 32) as u32;
        if bit_shift > 0 {
            let mut carry = 0u32;
            for limb in &mut self.limbs {
                let next = *limb >> (32 - bit_shift);
                *limb = (*limb << bit_shift) | carry;
                carry = next;
            }
            if carry != 0 {
                self.limbs.push(carry);
            }
        }
        if limb_shift > 0 {
            self.limbs.splice(0..0, std::iter::repeat_n(0, limb_shift));
        }
    }

    /// Shifts right in place, discarding the low bits.
    pub fn shr(&mut self, bits: u64) {
        let limb_shift = (bits / 32) as usize;
        if limb_shift >= self.limbs.len() {
            self.limbs.clear();
            return;
        }
        self.limbs.drain(..limb_shift);
        let bit_shift = (bits % 32) as u32;
        if bit_shift > 0 {
            let mut carry = 0u32;
            for limb in self.limbs.iter_mut().rev() {
                let next = *limb << (32 - bit_shift);
                *limb = (*limb >> bit_shift) | carry;
                carry = next;
            }
        }
        self.normalize();
    }

    /// Builds a value from little-endian magnitude bytes.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut limbs = Vec::with_capacity(bytes.len().div_ceil(4));
        for chunk in bytes.chunks(4) {
            let mut limb = 0u32;
            for (i, &b) in chunk.iter().enumerate() {
                limb |= u32::from(b) << (8 * i);
            }
            limbs.push(limb);
        }
        let mut n = Self { limbs };
        n.normalize();
        n
    }

    /// Returns the minimal little-endian magnitude bytes (empty for zero).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.limbs.iter().flat_map(|l| l.to_le_bytes()).collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    /// Parses a string of digits in the given radix.
    ///
    /// Returns `None` for an empty string or any character that is not a
    /// digit in `radix`. Separators must be stripped by the caller.
    pub fn parse_radix(digits: &str, radix: u32) -> Option<Self> {
        if digits.is_empty() {
            return None;
        }
        let mut n = Self::zero();
        for c in digits.chars() {
            let d = c.to_digit(radix)?;
            n.mul_small(radix);
            n.add_small(d);
        }
        Some(n)
    }

    /// Renders the value in the given radix (lowercase letters).
    pub fn to_string_radix(&self, radix: u32) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let mut n = self.clone();
        let mut digits = Vec::new();
        while !n.is_zero() {
            let d = n.div_small(radix);
            digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        }
        digits.iter().rev().collect()
    }
}

impl fmt::Display for BigUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_radix(10))
    }
}

/// Signed big integer in sign-magnitude form.
///
/// Zero is never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: BigUint,
}

impl BigInt {
    pub fn new(negative: bool, magnitude: BigUint) -> Self {
        let negative = negative && !magnitude.is_zero();
        Self {
            negative,
            magnitude,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::new(value < 0, BigUint::from_u64(value.unsigned_abs()))
    }

    pub fn from_i128(value: i128) -> Self {
        Self::new(value < 0, BigUint::from_u128(value.unsigned_abs()))
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> &BigUint {
        &self.magnitude
    }

    /// Returns the value as an i64 if it fits.
    pub fn to_i64(&self) -> Option<i64> {
        let m = self.magnitude.to_u64()?;
        if self.negative {
            if m <= 1 << 63 {
                Some((m as i64).wrapping_neg())
            } else {
                None
            }
        } else {
            i64::try_from(m).ok()
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        write!(f, "{}", self.magnitude)
    }
}
