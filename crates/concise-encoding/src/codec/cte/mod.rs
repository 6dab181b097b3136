//! Concise Text Encoding.
//!
//! A document is a `c1` header followed by one value:
//!
//! ```text
//! c1
//! {
//!     name = "Alice"
//!     tags = [admin @true 0x1f]
//!     seen = 2024-05-01/12:00:00/Europe/Berlin
//!     &1 self = {next = #1}
//! }
//! ```

pub mod decoder;
pub mod encoder;
pub mod number;

pub use decoder::CteDecoder;
pub use encoder::CteEncoder;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::event::{ElementType, Event, replay};
use crate::limits::Limits;
use crate::rules::Rules;

lazy_static! {
    /// Values written as `@name`.
    pub(crate) static ref NAMED_VALUES: FxHashMap<&'static str, Event> = {
        let mut map = FxHashMap::default();
        map.insert("nil", Event::Nil);
        map.insert("true", Event::Bool(true));
        map.insert("false", Event::Bool(false));
        map.insert("inf", Event::Float(f64::INFINITY));
        map.insert("nan", Event::Nan { signaling: false });
        map.insert("snan", Event::Nan { signaling: true });
        map
    };

    /// Typed-array element names and the default radix of their elements.
    pub(crate) static ref ELEMENT_TYPES: FxHashMap<&'static str, (ElementType, u32)> = {
        let mut map = FxHashMap::default();
        for element in [
            ElementType::Bit,
            ElementType::U8,
            ElementType::U16,
            ElementType::U32,
            ElementType::U64,
            ElementType::I8,
            ElementType::I16,
            ElementType::I32,
            ElementType::I64,
            ElementType::F16,
            ElementType::F32,
            ElementType::F64,
            ElementType::Uid,
        ] {
            map.insert(element.name(), (element, 10));
        }
        map.insert("u8x", (ElementType::U8, 16));
        map.insert("u16x", (ElementType::U16, 16));
        map.insert("u32x", (ElementType::U32, 16));
        map.insert("u64x", (ElementType::U64, 16));
        map.insert("i8x", (ElementType::I8, 16));
        map.insert("i16x", (ElementType::I16, 16));
        map.insert("i32x", (ElementType::I32, 16));
        map.insert("i64x", (ElementType::I64, 16));
        map
    };
}

/// Returns true if `s` can be written without quotes.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parses the canonical hyphenated UUID form.
pub(crate) fn parse_uuid(token: &str) -> Option<[u8; 16]> {
    let bytes = token.as_bytes();
    let shaped = bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        });
    if !shaped {
        return None;
    }
    uuid::Uuid::parse_str(token).ok().map(|uuid| *uuid.as_bytes())
}

/// Decodes a complete CTE document into events.
pub fn decode_cte(input: &[u8]) -> Result<Vec<Event>, Error> {
    decode_cte_with_limits(input, Limits::default())
}

/// Decodes a complete CTE document with custom limits.
pub fn decode_cte_with_limits(input: &[u8], limits: Limits) -> Result<Vec<Event>, Error> {
    CteDecoder::new(Vec::new(), limits).decode(input)
}

/// Encodes a complete event stream as CTE text.
pub fn encode_cte(events: &[Event]) -> Result<String, Error> {
    encode_cte_with_limits(events, Limits::default())
}

/// Encodes a complete event stream as CTE text with custom limits.
pub fn encode_cte_with_limits(events: &[Event], limits: Limits) -> Result<String, Error> {
    let mut rules = Rules::new(CteEncoder::new(), limits);
    replay(events, &mut rules)?;
    if !rules.is_complete() {
        return Err(Error::UnexpectedEof { context: "document" });
    }
    Ok(rules.into_inner().into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::document;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("abc"));
        assert!(is_identifier("_a-b.c9"));
        assert!(is_identifier("café"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("9a"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier("-a"));
    }

    #[test]
    fn test_uuid_shape() {
        assert!(parse_uuid("123e4567-e89b-12d3-a456-426614174000").is_some());
        assert!(parse_uuid("123e4567e89b12d3a456426614174000").is_none());
        assert!(parse_uuid("123e4567-e89b-12d3-a456-42661417400g").is_none());
    }

    #[test]
    fn test_round_trip_text() {
        let text = "c1\n{a=[1 -2 1.5 @nil] \"b c\"=<x y=1|text>}";
        let events = decode_cte(text.as_bytes()).unwrap();
        assert_eq!(encode_cte(&events).unwrap(), text);
    }

    #[test]
    fn test_self_reference() {
        let events = decode_cte(b"c1 &1 {Value=100 Next=#1}").unwrap();
        assert_eq!(encode_cte(&events).unwrap(), "c1\n&1 {Value=100 Next=#1}");
    }

    #[test]
    fn test_uuid_shaped_string_is_quoted() {
        let events = document([Event::String("abcdef01-2345-6789-abcd-ef0123456789".to_string())]);
        let text = encode_cte(&events).unwrap();
        assert_eq!(text, "c1\n\"abcdef01-2345-6789-abcd-ef0123456789\"");
        assert_eq!(decode_cte(text.as_bytes()).unwrap(), events);
    }
}
