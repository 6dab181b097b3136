//! Primitive encoding/decoding for the CBE binary format.
//!
//! Implements varints (LEB128, bounded and unbounded), zigzag, and
//! little-endian fixed-width numbers.

use crate::error::Error;
use crate::limits::MAX_VARINT_BYTES;
use crate::util::bigint::BigUint;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking. Running out of data is reported as
/// [`Error::UnexpectedEof`], which the incremental decoder treats as
/// "wait for more input".
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, Error> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], Error> {
        if n > self.remaining_len() {
            return Err(Error::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, Error> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            // Check for overflow
            if shift >= 64 || (shift == 63 && value > 1) {
                return Err(Error::VarintOverflow);
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;

            if i == MAX_VARINT_BYTES - 1 {
                return Err(Error::VarintTooLong);
            }
        }

        Err(Error::VarintTooLong)
    }

    /// Reads a signed varint (zigzag encoded).
    pub fn read_signed_varint(&mut self, context: &'static str) -> Result<i64, Error> {
        let unsigned = self.read_varint(context)?;
        Ok(zigzag_decode(unsigned))
    }

    /// Reads an unbounded LEB128 integer.
    ///
    /// `max_bytes` bounds the encoded length so hostile input cannot grow
    /// the value without limit.
    pub fn read_big_varint(&mut self, max_bytes: usize, context: &'static str) -> Result<BigUint, Error> {
        let mut groups = Vec::new();
        loop {
            let byte = self.read_byte(context)?;
            groups.push(byte & 0x7F);
            if byte & 0x80 == 0 {
                break;
            }
            if groups.len() >= max_bytes {
                return Err(Error::VarintTooLong);
            }
        }
        Ok(BigUint::from_le_bytes(&pack_groups(&groups)))
    }

    #[inline]
    pub fn read_u16_le(&mut self, context: &'static str) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    #[inline]
    pub fn read_u32_le(&mut self, context: &'static str) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    #[inline]
    pub fn read_u64_le(&mut self, context: &'static str) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f32 (NaN payloads preserved).
    #[inline]
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, Error> {
        Ok(f32::from_bits(self.read_u32_le(context)?))
    }

    /// Reads a little-endian f64 (NaN payloads preserved).
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, Error> {
        Ok(f64::from_bits(self.read_u64_le(context)?))
    }

    /// Reads UTF-8 text of a known length.
    pub fn read_str(&mut self, len: usize, context: &'static str) -> Result<String, Error> {
        let bytes = self.read_bytes(len, context)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| Error::InvalidUtf8 {
                offset: e.valid_up_to(),
            })
    }
}

/// Packs 7-bit groups (least significant first) into little-endian bytes.
fn pack_groups(groups: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(groups.len());
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &group in groups {
        acc |= u32::from(group) << bits;
        bits += 7;
        while bits >= 8 {
            bytes.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        bytes.push(acc as u8);
    }
    bytes
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        // Use stack buffer to batch writes (faster than multiple push calls)
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a signed varint (zigzag encoded).
    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    /// Writes an unbounded LEB128 integer.
    pub fn write_big_varint(&mut self, value: &BigUint) {
        let bytes = value.to_le_bytes();
        if bytes.is_empty() {
            self.buf.push(0);
            return;
        }
        let total_bits = value.bits();
        let groups = total_bits.div_ceil(7);
        for g in 0..groups {
            let bit = g * 7;
            let idx = (bit / 8) as usize;
            let shift = bit % 8;
            let lo = u16::from(bytes[idx]);
            let hi = bytes.get(idx + 1).map_or(0, |b| u16::from(*b));
            let mut byte = (((hi << 8) | lo) >> shift) as u8 & 0x7F;
            if g + 1 < groups {
                byte |= 0x80;
            }
            self.buf.push(byte);
        }
    }

    #[inline]
    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian f32.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32_le(value.to_bits());
    }

    /// Writes a little-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64_le(value.to_bits());
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Encodes a signed integer using zigzag encoding.
///
/// Maps negative numbers to odd positive numbers:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}
