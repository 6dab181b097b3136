//! CTE encoder: an event sink that writes compact single-line text.
//!
//! Output is `c1` and a newline followed by the top-level value. Items are
//! separated by one space, map-like containers write `key=value`, and
//! chunked arrays are buffered until their last chunk arrives.

use std::fmt::Write as _;

use uuid::Uuid;

use super::number::{format_big_float, format_decimal, format_f32, format_f64};
use super::{is_identifier, parse_uuid};
use crate::error::Error;
use crate::event::{ArrayType, ElementType, Event, EventSink, MarkerId};

const FORMAT: &str = "CTE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Top,
    List,
    Map,
    Metadata,
    MarkupName,
    MarkupAttributes,
    MarkupContent,
    Comment,
}

impl Kind {
    fn is_keyed(self) -> bool {
        matches!(self, Kind::Map | Kind::Metadata | Kind::MarkupAttributes)
    }
}

#[derive(Debug, Clone)]
struct Frame {
    kind: Kind,
    /// Completed objects (keys and values).
    objects: u64,
    /// Items written, including comments and markers.
    items: u64,
    /// `=` already written for the current value slot.
    equals_written: bool,
}

impl Frame {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            objects: 0,
            items: 0,
            equals_written: false,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingArray {
    array_type: ArrayType,
    length: u64,
    remaining: u64,
    is_final: bool,
    data: Vec<u8>,
}

/// Event sink producing CTE text.
#[derive(Debug, Clone)]
pub struct CteEncoder {
    out: String,
    frames: Vec<Frame>,
    /// A marker or metadata was just written; the next item needs a space.
    after_prefix: bool,
    array: Option<PendingArray>,
    /// Last character written inside the innermost comment.
    comment_last: Option<char>,
}

impl Default for CteEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CteEncoder {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            frames: vec![Frame::new(Kind::Top)],
            after_prefix: false,
            array: None,
            comment_last: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn frame(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn kind(&self) -> Kind {
        self.frames.last().map_or(Kind::Top, |f| f.kind)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Writes the separator that precedes the next item.
    fn begin_item(&mut self) -> Result<(), Error> {
        let after_prefix = std::mem::take(&mut self.after_prefix);
        let comment_last = self.comment_last;
        let frame = self.frame();
        match frame.kind {
            Kind::Comment => {
                // "*" followed by "/*" would read as the end of the comment
                if comment_last == Some('*') {
                    return Err(unsupported("comment text ending in '*' before a nested comment"));
                }
                return Ok(());
            }
            Kind::MarkupContent => {
                let first = frame.items == 0;
                frame.items += 1;
                if first {
                    self.out.push('|');
                }
                return Ok(());
            }
            _ => {}
        }
        let separator = if after_prefix {
            Some(' ')
        } else if frame.kind.is_keyed() && frame.objects % 2 == 1 && !frame.equals_written {
            frame.equals_written = true;
            Some('=')
        } else if frame.items > 0 {
            Some(' ')
        } else {
            None
        };
        frame.items += 1;
        if let Some(c) = separator {
            self.out.push(c);
        }
        Ok(())
    }

    fn complete_object(&mut self) {
        let frame = self.frame();
        frame.objects += 1;
        frame.equals_written = false;
    }

    fn push(&mut self, kind: Kind) {
        self.frames.push(Frame::new(kind));
    }

    fn end(&mut self) -> Result<(), Error> {
        match self.kind() {
            Kind::Top | Kind::MarkupName => return Err(Error::UnbalancedEnd),
            Kind::MarkupAttributes => {
                let frame = self.frame();
                frame.kind = Kind::MarkupContent;
                frame.items = 0;
                frame.objects = 0;
                return Ok(());
            }
            Kind::Comment => {
                if self.comment_last == Some('/') {
                    return Err(unsupported("comment text ending in '/'"));
                }
                self.out.push_str("*/");
                self.frames.pop();
                self.comment_last = None;
                return Ok(());
            }
            Kind::List => self.out.push(']'),
            Kind::Map => self.out.push('}'),
            Kind::Metadata => {
                self.out.push(')');
                self.frames.pop();
                self.after_prefix = true;
                return Ok(());
            }
            Kind::MarkupContent => self.out.push('>'),
        }
        self.frames.pop();
        self.complete_object();
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    fn value(&mut self, event: &Event) -> Result<(), Error> {
        match event {
            Event::String(s) => return self.string(s),
            Event::CommentText(text) => return self.comment_text(text),
            Event::Array { .. }
                if self
                    .frames
                    .last()
                    .is_some_and(|f| f.kind == Kind::MarkupAttributes && f.objects % 2 == 0) =>
            {
                return Err(unsupported("typed array as a markup attribute key"));
            }
            _ => {}
        }
        self.begin_item()?;
        match event {
            Event::Nil => self.out.push_str("@nil"),
            Event::Bool(true) => self.out.push_str("@true"),
            Event::Bool(false) => self.out.push_str("@false"),
            Event::Int(n) => write_display(&mut self.out, n),
            Event::PositiveInt(n) => write_display(&mut self.out, n),
            Event::BigInt(n) => write_display(&mut self.out, n),
            Event::Float(f) => self.out.push_str(&format_f64(*f)),
            Event::BigFloat(f) => self.out.push_str(&format_big_float(f)),
            Event::DecimalFloat(d) => self.out.push_str(&format_decimal(d)),
            Event::Nan { signaling: true } => self.out.push_str("@snan"),
            Event::Nan { signaling: false } => self.out.push_str("@nan"),
            Event::Uid(uid) => write_display(&mut self.out, &Uuid::from_bytes(*uid).hyphenated()),
            Event::Time(value) => write_display(&mut self.out, value),
            Event::ResourceId(s) => {
                self.out.push('u');
                write_quoted(&mut self.out, s);
            }
            Event::CustomText(s) => {
                self.out.push('t');
                write_quoted(&mut self.out, s);
            }
            Event::Bytes(data) => write_hex_literal(&mut self.out, 'b', data),
            Event::CustomBinary(data) => write_hex_literal(&mut self.out, 'c', data),
            Event::Array {
                element: ElementType::U8,
                data,
                ..
            } => write_hex_literal(&mut self.out, 'b', data),
            Event::Array {
                element,
                length,
                data,
            } => write_typed_array(&mut self.out, *element, *length, data),
            _ => {
                return Err(Error::UnexpectedEvent {
                    event: event.name(),
                    context: "as a CTE value",
                });
            }
        }
        self.complete_object();
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<(), Error> {
        match self.kind() {
            Kind::MarkupName => {
                write_string(&mut self.out, s);
                let frame = self.frame();
                frame.kind = Kind::MarkupAttributes;
                // Attributes are separated from the name by a space
                frame.items = 1;
                Ok(())
            }
            Kind::MarkupContent => {
                self.begin_item()?;
                write_content(&mut self.out, s);
                Ok(())
            }
            _ => {
                self.begin_item()?;
                write_string(&mut self.out, s);
                self.complete_object();
                Ok(())
            }
        }
    }

    fn comment_text(&mut self, text: &str) -> Result<(), Error> {
        let Some(first) = text.chars().next() else {
            return Ok(());
        };
        let joins_badly = matches!((self.comment_last, first), (Some('/'), '*') | (Some('*'), '/'));
        if joins_badly || text.contains("/*") || text.contains("*/") {
            return Err(unsupported("comment text containing a comment delimiter"));
        }
        self.out.push_str(text);
        self.comment_last = text.chars().next_back();
        Ok(())
    }

    fn marker_id(&mut self, prefix: char, id: &MarkerId) -> Result<(), Error> {
        if let MarkerId::Name(name) = id {
            if !is_marker_name(name) {
                return Err(unsupported("marker name that is not an identifier"));
            }
        }
        self.begin_item()?;
        self.out.push(prefix);
        write_display(&mut self.out, id);
        Ok(())
    }

    // =========================================================================
    // Chunked arrays
    // =========================================================================

    fn array_chunk(&mut self, length: u64, is_final: bool) -> Result<(), Error> {
        let array = self.array.as_mut().ok_or(Error::UnexpectedEvent {
            event: "array chunk",
            context: "outside an array",
        })?;
        array.length += length;
        array.remaining = array.array_type.byte_length(length).unwrap_or(0);
        array.is_final = is_final;
        self.finish_array()
    }

    fn array_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let array = self.array.as_mut().ok_or(Error::UnexpectedEvent {
            event: "array data",
            context: "outside an array",
        })?;
        array.data.extend_from_slice(data);
        array.remaining = array.remaining.saturating_sub(data.len() as u64);
        self.finish_array()
    }

    fn finish_array(&mut self) -> Result<(), Error> {
        let done = self
            .array
            .as_ref()
            .is_some_and(|array| array.is_final && array.remaining == 0);
        if !done {
            return Ok(());
        }
        let Some(array) = self.array.take() else {
            return Ok(());
        };
        let event = Event::from_array(array.array_type, array.length, array.data)?;
        self.event(event)
    }
}

impl EventSink for CteEncoder {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        match &event {
            Event::BeginDocument | Event::EndDocument | Event::Padding(_) => Ok(()),
            Event::Version(version) => {
                write_display(&mut self.out, &format_args!("c{}\n", version));
                Ok(())
            }

            Event::ListBegin => self.container("[", Kind::List),
            Event::MapBegin => self.container("{", Kind::Map),
            Event::MetadataBegin => self.container("(", Kind::Metadata),
            Event::MarkupBegin => self.container("<", Kind::MarkupName),
            Event::CommentBegin => {
                self.container("/*", Kind::Comment)?;
                self.comment_last = None;
                Ok(())
            }
            Event::End => self.end(),

            Event::ArrayBegin(array_type) => {
                self.array = Some(PendingArray {
                    array_type: *array_type,
                    length: 0,
                    remaining: 0,
                    is_final: false,
                    data: Vec::new(),
                });
                Ok(())
            }
            Event::ArrayChunk { length, is_final } => self.array_chunk(*length, *is_final),
            Event::ArrayData(data) => self.array_data(data),

            Event::Marker(id) => {
                if self.kind() == Kind::MarkupContent {
                    return Err(unsupported("marker in markup content"));
                }
                self.marker_id('&', id)?;
                self.after_prefix = true;
                Ok(())
            }
            Event::Reference(id) => {
                self.marker_id('#', id)?;
                self.complete_object();
                Ok(())
            }

            _ => self.value(&event),
        }
    }
}

impl CteEncoder {
    fn container(&mut self, open: &str, kind: Kind) -> Result<(), Error> {
        self.begin_item()?;
        self.out.push_str(open);
        self.push(kind);
        Ok(())
    }
}

fn unsupported(type_name: &'static str) -> Error {
    Error::UnsupportedType {
        type_name,
        format: FORMAT,
    }
}

fn write_display(out: &mut String, value: &impl std::fmt::Display) {
    // Writing to a String cannot fail
    let _ = write!(out, "{}", value);
}

fn is_marker_name(name: &str) -> bool {
    !name.is_empty()
        && !name.bytes().all(|b| b.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Writes a string unquoted when it reads back as the same identifier.
fn write_string(out: &mut String, s: &str) {
    if is_identifier(s) && parse_uuid(s).is_none() {
        out.push_str(s);
    } else {
        write_quoted(out, s);
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => write_display(out, &format_args!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Writes markup content text, escaping the characters that end it.
fn write_content(out: &mut String, s: &str) {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '<' => out.push_str("\\<"),
            '>' => out.push_str("\\>"),
            '/' if chars.peek() == Some(&'*') => out.push_str("\\/"),
            '\n' | '\t' => out.push(c),
            c if c.is_control() => write_display(out, &format_args!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
}

fn write_hex_literal(out: &mut String, prefix: char, data: &[u8]) {
    out.push(prefix);
    out.push('"');
    for byte in data {
        write_display(out, &format_args!("{:02x}", byte));
    }
    out.push('"');
}

fn write_typed_array(out: &mut String, element: ElementType, length: u64, data: &[u8]) {
    out.push('|');
    out.push_str(element.name());
    match element {
        ElementType::Bit => {
            for i in 0..length as usize {
                let bit = data.get(i / 8).map_or(0, |byte| (byte >> (i % 8)) & 1);
                out.push_str(if bit == 1 { " 1" } else { " 0" });
            }
        }
        ElementType::U8 => {
            for byte in data {
                write_display(out, &format_args!(" {}", byte));
            }
        }
        ElementType::I8 => {
            for byte in data {
                write_display(out, &format_args!(" {}", *byte as i8));
            }
        }
        ElementType::U16 => write_elements(out, data, |b: [u8; 2]| u16::from_le_bytes(b).to_string()),
        ElementType::U32 => write_elements(out, data, |b: [u8; 4]| u32::from_le_bytes(b).to_string()),
        ElementType::U64 => write_elements(out, data, |b: [u8; 8]| u64::from_le_bytes(b).to_string()),
        ElementType::I16 => write_elements(out, data, |b: [u8; 2]| i16::from_le_bytes(b).to_string()),
        ElementType::I32 => write_elements(out, data, |b: [u8; 4]| i32::from_le_bytes(b).to_string()),
        ElementType::I64 => write_elements(out, data, |b: [u8; 8]| i64::from_le_bytes(b).to_string()),
        ElementType::F16 => write_elements(out, data, |b: [u8; 2]| {
            format_f32(f32::from_bits(u32::from(u16::from_le_bytes(b)) << 16))
        }),
        ElementType::F32 => write_elements(out, data, |b: [u8; 4]| format_f32(f32::from_le_bytes(b))),
        ElementType::F64 => write_elements(out, data, |b: [u8; 8]| format_f64(f64::from_le_bytes(b))),
        ElementType::Uid => write_elements(out, data, |b: [u8; 16]| {
            Uuid::from_bytes(b).hyphenated().to_string()
        }),
    }
    out.push('|');
}

fn write_elements<const N: usize>(out: &mut String, data: &[u8], render: impl Fn([u8; N]) -> String) {
    for chunk in data.chunks_exact(N) {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(chunk);
        out.push(' ');
        out.push_str(&render(bytes));
    }
}
