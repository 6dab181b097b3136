//! The event model shared by every codec.
//!
//! A document is a flat sequence of [`Event`]s. Decoders produce events,
//! encoders consume them, and the [`Rules`](crate::rules::Rules) engine sits
//! in between to enforce document structure. Anything that accepts events
//! implements [`EventSink`].

pub mod number;

use crate::error::Error;
use crate::limits::FORMAT_VERSION;
use crate::util::bigint::BigInt;
use crate::util::datetime::TimeValue;

pub use number::{BigFloat, DecimalFloat};

/// Element type of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Bit-packed booleans, LSB-first within each byte.
    Bit,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// bfloat16: the upper 16 bits of an f32.
    F16,
    F32,
    F64,
    Uid,
}

impl ElementType {
    /// Returns the element width in bytes (0 for bit arrays).
    pub fn width(self) -> u64 {
        match self {
            ElementType::Bit => 0,
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 | ElementType::F16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::I64 | ElementType::F64 => 8,
            ElementType::Uid => 16,
        }
    }

    /// Returns the number of bytes needed for `count` elements.
    pub fn byte_length(self, count: u64) -> Option<u64> {
        match self {
            ElementType::Bit => Some(count.div_ceil(8)),
            other => count.checked_mul(other.width()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Bit => "b",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::Uid => "uid",
        }
    }
}

/// Kind of an array delivered in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayType {
    String,
    ResourceId,
    CustomBinary,
    CustomText,
    /// Comment text inside a comment container.
    Comment,
    /// Typed array; `Typed(U8)` is the byte array.
    Typed(ElementType),
}

impl ArrayType {
    /// Returns true if the array content must be valid UTF-8.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            ArrayType::String | ArrayType::ResourceId | ArrayType::CustomText | ArrayType::Comment
        )
    }

    /// Returns the number of bytes needed for `count` elements.
    pub fn byte_length(self, count: u64) -> Option<u64> {
        match self {
            ArrayType::Typed(element) => element.byte_length(count),
            _ => Some(count),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArrayType::String => "string",
            ArrayType::ResourceId => "resource identifier",
            ArrayType::CustomBinary => "custom binary",
            ArrayType::CustomText => "custom text",
            ArrayType::Comment => "comment text",
            ArrayType::Typed(ElementType::U8) => "byte array",
            ArrayType::Typed(_) => "typed array",
        }
    }
}

/// Marker and reference identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerId {
    Int(u64),
    Name(String),
}

impl MarkerId {
    /// Parses CTE identifier text: all digits become an integer id.
    pub fn from_text(text: &str) -> Self {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = text.parse() {
                return MarkerId::Int(n);
            }
        }
        MarkerId::Name(text.to_string())
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerId::Int(n) => write!(f, "{}", n),
            MarkerId::Name(name) => f.write_str(name),
        }
    }
}

/// A single step of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BeginDocument,
    Version(u64),
    EndDocument,
    /// CBE padding bytes; carry no data.
    Padding(usize),

    Nil,
    Bool(bool),
    Int(i64),
    PositiveInt(u64),
    BigInt(BigInt),
    Float(f64),
    BigFloat(BigFloat),
    DecimalFloat(DecimalFloat),
    Nan {
        signaling: bool,
    },
    Uid([u8; 16]),
    Time(TimeValue),

    String(String),
    ResourceId(String),
    CustomText(String),
    CommentText(String),
    Bytes(Vec<u8>),
    CustomBinary(Vec<u8>),
    /// Complete typed array; `length` counts elements (bits for `Bit`).
    Array {
        element: ElementType,
        length: u64,
        data: Vec<u8>,
    },

    ListBegin,
    MapBegin,
    MarkupBegin,
    MetadataBegin,
    CommentBegin,
    End,

    ArrayBegin(ArrayType),
    /// Starts the next chunk of the open array; `length` counts elements.
    ArrayChunk {
        length: u64,
        is_final: bool,
    },
    ArrayData(Vec<u8>),

    Marker(MarkerId),
    Reference(MarkerId),
}

impl Event {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Event::BeginDocument => "begin document",
            Event::Version(_) => "version",
            Event::EndDocument => "end document",
            Event::Padding(_) => "padding",
            Event::Nil => "nil",
            Event::Bool(_) => "boolean",
            Event::Int(_) | Event::PositiveInt(_) | Event::BigInt(_) => "integer",
            Event::Float(_) | Event::BigFloat(_) | Event::DecimalFloat(_) => "float",
            Event::Nan { .. } => "NaN",
            Event::Uid(_) => "UID",
            Event::Time(_) => "time",
            Event::String(_) => "string",
            Event::ResourceId(_) => "resource identifier",
            Event::CustomText(_) => "custom text",
            Event::CommentText(_) => "comment text",
            Event::Bytes(_) => "byte array",
            Event::CustomBinary(_) => "custom binary",
            Event::Array { .. } => "typed array",
            Event::ListBegin => "list",
            Event::MapBegin => "map",
            Event::MarkupBegin => "markup",
            Event::MetadataBegin => "metadata",
            Event::CommentBegin => "comment",
            Event::End => "end of container",
            Event::ArrayBegin(array_type) => array_type.name(),
            Event::ArrayChunk { .. } => "array chunk",
            Event::ArrayData(_) => "array data",
            Event::Marker(_) => "marker",
            Event::Reference(_) => "reference",
        }
    }

    /// Builds the complete event for a fully assembled array.
    pub fn from_array(array_type: ArrayType, length: u64, data: Vec<u8>) -> Result<Event, Error> {
        let text = |data: Vec<u8>| {
            String::from_utf8(data).map_err(|e| Error::InvalidUtf8 {
                offset: e.utf8_error().valid_up_to(),
            })
        };
        Ok(match array_type {
            ArrayType::String => Event::String(text(data)?),
            ArrayType::ResourceId => Event::ResourceId(text(data)?),
            ArrayType::CustomText => Event::CustomText(text(data)?),
            ArrayType::Comment => Event::CommentText(text(data)?),
            ArrayType::CustomBinary => Event::CustomBinary(data),
            ArrayType::Typed(ElementType::U8) => Event::Bytes(data),
            ArrayType::Typed(element) => Event::Array {
                element,
                length,
                data,
            },
        })
    }
}

/// Receiver of document events.
pub trait EventSink {
    fn event(&mut self, event: Event) -> Result<(), Error>;
}

impl EventSink for Vec<Event> {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        self.push(event);
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        (**self).event(event)
    }
}

/// Sink that records events with chunked arrays coalesced.
///
/// Two streams that differ only in how arrays were split into chunks record
/// identically, which makes this the natural comparison point for tests and
/// for consumers that do not care about chunk boundaries. Padding is dropped.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
    array: Option<PendingArray>,
}

#[derive(Debug, Clone)]
struct PendingArray {
    array_type: ArrayType,
    length: u64,
    data: Vec<u8>,
    is_final: bool,
    remaining: u64,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    fn finish_array_if_done(&mut self) -> Result<(), Error> {
        let done = self
            .array
            .as_ref()
            .is_some_and(|array| array.is_final && array.remaining == 0);
        if done {
            if let Some(array) = self.array.take() {
                self.events
                    .push(Event::from_array(array.array_type, array.length, array.data)?);
            }
        }
        Ok(())
    }
}

impl EventSink for EventRecorder {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        match event {
            Event::Padding(_) => {}
            Event::ArrayBegin(array_type) => {
                self.array = Some(PendingArray {
                    array_type,
                    length: 0,
                    data: Vec::new(),
                    is_final: false,
                    remaining: 0,
                });
            }
            Event::ArrayChunk { length, is_final } => {
                if let Some(array) = self.array.as_mut() {
                    array.length += length;
                    array.is_final = is_final;
                    array.remaining = array.array_type.byte_length(length).unwrap_or(0);
                }
                self.finish_array_if_done()?;
            }
            Event::ArrayData(data) => {
                if let Some(array) = self.array.as_mut() {
                    array.remaining = array.remaining.saturating_sub(data.len() as u64);
                    array.data.extend_from_slice(&data);
                }
                self.finish_array_if_done()?;
            }
            other => self.events.push(other),
        }
        Ok(())
    }
}

/// Wraps top-level events in a version 1 document.
pub fn document(body: impl IntoIterator<Item = Event>) -> Vec<Event> {
    let mut events = vec![Event::BeginDocument, Event::Version(FORMAT_VERSION)];
    events.extend(body);
    events.push(Event::EndDocument);
    events
}

/// Sends every event to `sink`, stopping at the first error.
pub fn replay<S: EventSink + ?Sized>(events: &[Event], sink: &mut S) -> Result<(), Error> {
    for event in events {
        sink.event(event.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_lengths() {
        assert_eq!(ElementType::Bit.byte_length(9), Some(2));
        assert_eq!(ElementType::U16.byte_length(3), Some(6));
        assert_eq!(ElementType::Uid.byte_length(2), Some(32));
        assert_eq!(ElementType::U64.byte_length(u64::MAX), None);
        assert_eq!(ArrayType::String.byte_length(7), Some(7));
    }

    #[test]
    fn test_marker_id_from_text() {
        assert_eq!(MarkerId::from_text("12"), MarkerId::Int(12));
        assert_eq!(MarkerId::from_text("a1"), MarkerId::Name("a1".to_string()));
        assert_eq!(
            MarkerId::from_text("99999999999999999999999"),
            MarkerId::Name("99999999999999999999999".to_string())
        );
    }

    #[test]
    fn test_from_array() {
        assert_eq!(
            Event::from_array(ArrayType::String, 2, b"hi".to_vec()).unwrap(),
            Event::String("hi".to_string())
        );
        assert_eq!(
            Event::from_array(ArrayType::Typed(ElementType::U8), 1, vec![7]).unwrap(),
            Event::Bytes(vec![7])
        );
        assert!(matches!(
            Event::from_array(ArrayType::String, 1, vec![0xFF]),
            Err(Error::InvalidUtf8 { offset: 0 })
        ));
    }

    #[test]
    fn test_recorder_coalesces_chunks() {
        let mut recorder = EventRecorder::new();
        for event in [
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk {
                length: 2,
                is_final: false,
            },
            Event::ArrayData(b"ab".to_vec()),
            Event::Padding(1),
            Event::ArrayChunk {
                length: 0,
                is_final: false,
            },
            Event::ArrayChunk {
                length: 1,
                is_final: true,
            },
            Event::ArrayData(b"c".to_vec()),
        ] {
            recorder.event(event).unwrap();
        }
        assert_eq!(recorder.events(), &[Event::String("abc".to_string())]);
    }

    #[test]
    fn test_document_wrapper() {
        let events = document([Event::Nil]);
        assert_eq!(
            events,
            vec![
                Event::BeginDocument,
                Event::Version(1),
                Event::Nil,
                Event::EndDocument
            ]
        );
    }
}
