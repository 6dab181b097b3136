//! Concise Binary Encoding.
//!
//! # Wire format
//!
//! A document is a ULEB128 version number followed by exactly one top-level
//! object. Every object starts with a one-byte type tag (see [`tags`]):
//!
//! - `0x00..=0x64` and `0x9C..=0xFF`: integers -100..=100 stored in the tag
//! - fixed-width integers store their magnitude little-endian after a
//!   positive or negative tag
//! - arrays (strings, bytes, typed arrays, ...) are sequences of chunks,
//!   each a ULEB128 header `length << 1 | more` followed by the data
//! - containers open with their tag and close with `0x7A`

pub mod decoder;
pub mod encoder;
pub mod tags;
pub mod time;

pub use decoder::CbeDecoder;
pub use encoder::CbeEncoder;

use crate::error::Error;
use crate::event::{Event, replay};
use crate::limits::Limits;
use crate::rules::Rules;

/// Decodes a complete CBE document into events.
pub fn decode_cbe(input: &[u8]) -> Result<Vec<Event>, Error> {
    decode_cbe_with_limits(input, Limits::default())
}

/// Decodes a complete CBE document with custom limits.
pub fn decode_cbe_with_limits(input: &[u8], limits: Limits) -> Result<Vec<Event>, Error> {
    let mut decoder = CbeDecoder::new(Vec::new(), limits);
    decoder.feed(input)?;
    decoder.finish()
}

/// Encodes a complete event stream as CBE.
///
/// The events must form a whole document, from `BeginDocument` through
/// `EndDocument`.
pub fn encode_cbe(events: &[Event]) -> Result<Vec<u8>, Error> {
    encode_cbe_with_limits(events, Limits::default())
}

/// Encodes a complete event stream as CBE with custom limits.
pub fn encode_cbe_with_limits(events: &[Event], limits: Limits) -> Result<Vec<u8>, Error> {
    let mut rules = Rules::new(CbeEncoder::new(), limits);
    replay(events, &mut rules)?;
    if !rules.is_complete() {
        return Err(Error::UnexpectedEof { context: "document" });
    }
    Ok(rules.into_inner().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::document;

    #[test]
    fn test_encode_decode_document() {
        let events = document([
            Event::MapBegin,
            Event::String("a".to_string()),
            Event::PositiveInt(1),
            Event::End,
        ]);
        let bytes = encode_cbe(&events).unwrap();
        assert_eq!(bytes, vec![0x01, 0x78, 0x81, b'a', 0x01, 0x7A]);
        assert_eq!(decode_cbe(&bytes).unwrap(), events);
    }

    #[test]
    fn test_encode_rejects_incomplete_document() {
        let events = vec![Event::BeginDocument, Event::Version(1), Event::ListBegin];
        assert!(encode_cbe(&events).is_err());
    }
}
