//! Incremental UTF-8 validation.
//!
//! Text arrays can arrive split across chunks (CBE) and CTE input can arrive
//! in arbitrary slices, so a multi-byte sequence may straddle two calls. The
//! validator keeps the partial code point between calls.

use crate::error::Error;

/// Byte-at-a-time UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    codepoint: u32,
    /// Continuation bytes still expected for the current sequence.
    remaining: u8,
    /// Smallest code point the current sequence length may encode.
    min: u32,
    offset: usize,
}

impl Utf8Validator {
    /// Creates a validator positioned at a character boundary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if the bytes consumed so far end on a character boundary.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Feeds one byte, returning the character it completes (if any).
    #[inline]
    pub fn feed(&mut self, byte: u8) -> Result<Option<char>, Error> {
        let offset = self.offset;
        self.offset += 1;

        if self.remaining == 0 {
            return match byte {
                0x00..=0x7F => Ok(Some(byte as char)),
                0xC2..=0xDF => self.start(u32::from(byte & 0x1F), 1, 0x80),
                0xE0..=0xEF => self.start(u32::from(byte & 0x0F), 2, 0x800),
                0xF0..=0xF4 => self.start(u32::from(byte & 0x07), 3, 0x10000),
                _ => Err(Error::InvalidUtf8 { offset }),
            };
        }

        if byte & 0xC0 != 0x80 {
            return Err(Error::InvalidUtf8 { offset });
        }
        self.codepoint = (self.codepoint << 6) | u32::from(byte & 0x3F);
        self.remaining -= 1;
        if self.remaining > 0 {
            return Ok(None);
        }

        // Overlong forms and surrogates are rejected; char::from_u32 covers both
        // surrogates and values above U+10FFFF.
        if self.codepoint < self.min {
            return Err(Error::InvalidUtf8 { offset });
        }
        char::from_u32(self.codepoint)
            .map(Some)
            .ok_or(Error::InvalidUtf8 { offset })
    }

    fn start(&mut self, bits: u32, remaining: u8, min: u32) -> Result<Option<char>, Error> {
        self.codepoint = bits;
        self.remaining = remaining;
        self.min = min;
        Ok(None)
    }

    /// Feeds a run of bytes, discarding the decoded characters.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            self.feed(byte)?;
        }
        Ok(())
    }

    /// Fails if the input ended in the middle of a multi-byte sequence.
    pub fn finish(&self) -> Result<(), Error> {
        if self.remaining == 0 {
            Ok(())
        } else {
            Err(Error::InvalidUtf8 {
                offset: self.offset,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(bytes: &[u8]) -> Result<(), Error> {
        let mut validator = Utf8Validator::new();
        validator.feed_all(bytes)?;
        validator.finish()
    }

    #[test]
    fn test_accepts_valid_text() {
        for s in ["", "hello", "caf\u{e9}", "\u{4f60}\u{597d}", "\u{1F600} ok"] {
            assert!(validate(s.as_bytes()).is_ok(), "rejected {:?}", s);
        }
    }

    #[test]
    fn test_split_sequence() {
        let bytes = "\u{1F600}".as_bytes();
        let mut validator = Utf8Validator::new();
        validator.feed_all(&bytes[..2]).unwrap();
        assert!(!validator.is_complete());
        assert!(validator.finish().is_err());
        assert_eq!(validator.feed(bytes[2]).unwrap(), None);
        assert_eq!(validator.feed(bytes[3]).unwrap(), Some('\u{1F600}'));
        assert!(validator.finish().is_ok());
    }

    #[test]
    fn test_rejects_invalid() {
        // Lone continuation byte
        assert_eq!(validate(&[0x61, 0x80]), Err(Error::InvalidUtf8 { offset: 1 }));
        // Overlong encoding of '/'
        assert!(validate(&[0xE0, 0x80, 0xAF]).is_err());
        // Surrogate half
        assert!(validate(&[0xED, 0xA0, 0x80]).is_err());
        // Above U+10FFFF
        assert!(validate(&[0xF4, 0x90, 0x80, 0x80]).is_err());
        // Invalid lead bytes
        assert!(validate(&[0xC0, 0xAF]).is_err());
        assert!(validate(&[0xFF]).is_err());
        // Truncated sequence
        assert!(validate(&[0xE4, 0xBD]).is_err());
    }
}
