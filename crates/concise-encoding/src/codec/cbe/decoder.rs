//! Incremental CBE decoder.
//!
//! Input may arrive in arbitrary pieces. Each item (a scalar, a container
//! marker, or one array chunk with its data) is parsed atomically from the
//! buffered input: if the buffer ends inside an item, nothing is emitted and
//! the bytes wait for the next [`CbeDecoder::feed`]. The emitted event
//! sequence therefore never depends on where the input was split.

use tracing::debug;

use super::tags;
use super::time::{read_date, read_time};
use crate::codec::primitives::{Reader, zigzag_decode};
use crate::error::Error;
use crate::event::{ArrayType, DecimalFloat, ElementType, Event, EventSink, MarkerId};
use crate::limits::Limits;
use crate::rules::Rules;
use crate::util::bigint::{BigInt, BigUint};
use crate::util::datetime::TimeValue;

/// Encoded length bound for decimal coefficients (about 1000 decimal digits).
const MAX_COEFFICIENT_BYTES: usize = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the version header.
    Header,
    /// Between items.
    Items,
    /// Inside a multi-chunk array, waiting for the next chunk header.
    Chunks(ArrayType),
}

/// Incremental CBE decoder feeding a validated event stream into `S`.
#[derive(Debug)]
pub struct CbeDecoder<S> {
    rules: Rules<S>,
    limits: Limits,
    buffer: Vec<u8>,
    /// Bytes consumed before the start of `buffer`.
    offset: u64,
    state: State,
}

impl<S: EventSink> CbeDecoder<S> {
    pub fn new(sink: S, limits: Limits) -> Self {
        Self {
            rules: Rules::new(sink, limits),
            limits,
            buffer: Vec::new(),
            offset: 0,
            state: State::Header,
        }
    }

    /// Number of bytes fully decoded so far.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Decodes as many complete items as the buffered input holds.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buffer.extend_from_slice(data);
        let buffer = std::mem::take(&mut self.buffer);
        let mut pos = 0;
        let result = loop {
            if pos == buffer.len() {
                break Ok(());
            }
            let mut reader = Reader::new(&buffer[pos..]);
            match self.step(&mut reader) {
                Ok(()) => pos += reader.position(),
                Err(e) if e.is_end_of_data() => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.offset += pos as u64;
        self.buffer = buffer;
        self.buffer.drain(..pos);
        result
    }

    /// Ends the input, failing if a document is incomplete.
    pub fn finish(mut self) -> Result<S, Error> {
        let context = match self.state {
            State::Header => Some("version header"),
            State::Chunks(_) => Some("array chunk"),
            State::Items if !self.buffer.is_empty() => Some("item"),
            State::Items if self.rules.needs_more() => Some("document"),
            State::Items => None,
        };
        if let Some(context) = context {
            return Err(Error::UnexpectedEof { context });
        }
        self.rules.event(Event::EndDocument)?;
        debug!(bytes = self.offset, "CBE document decoded");
        Ok(self.rules.into_inner())
    }

    fn emit(&mut self, event: Event) -> Result<(), Error> {
        self.rules.event(event)
    }

    /// Parses and emits one item. Nothing is emitted unless the whole item
    /// was available.
    fn step(&mut self, reader: &mut Reader<'_>) -> Result<(), Error> {
        match self.state {
            State::Header => {
                let version = reader.read_varint("version header")?;
                self.state = State::Items;
                self.emit(Event::BeginDocument)?;
                self.emit(Event::Version(version))
            }
            State::Chunks(array_type) => {
                let (length, is_final, data) = self.read_chunk(reader, array_type)?;
                if is_final {
                    self.state = State::Items;
                }
                self.emit(Event::ArrayChunk { length, is_final })?;
                if !data.is_empty() {
                    self.emit(Event::ArrayData(data))?;
                }
                Ok(())
            }
            State::Items => {
                let tag = reader.read_byte("type tag")?;
                self.read_item(tag, reader)
            }
        }
    }

    fn read_item(&mut self, tag: u8, reader: &mut Reader<'_>) -> Result<(), Error> {
        let event = match tag {
            0x00..=tags::SMALL_INT_MAX => Event::PositiveInt(u64::from(tag)),
            tags::SMALL_NEG_INT_MIN..=0xFF => Event::Int(i64::from(tag as i8)),

            tags::DECIMAL_FLOAT => Event::DecimalFloat(read_decimal(reader)?),
            tags::POS_BIG_INT | tags::NEG_BIG_INT => {
                let len = reader.read_varint("big integer length")?;
                if len > self.limits.max_array_size {
                    return Err(Error::LimitExceeded {
                        limit: "big integer size",
                        value: len,
                        max: self.limits.max_array_size,
                    });
                }
                let bytes = reader.read_bytes(len as usize, "big integer")?;
                let magnitude = BigUint::from_le_bytes(bytes);
                integer_event(tag == tags::NEG_BIG_INT, magnitude)?
            }
            tags::POS_INT8 | tags::NEG_INT8 => {
                let m = reader.read_byte("int8")?;
                fixed_int_event(tag == tags::NEG_INT8, u64::from(m))?
            }
            tags::POS_INT16 | tags::NEG_INT16 => {
                let m = reader.read_u16_le("int16")?;
                fixed_int_event(tag == tags::NEG_INT16, u64::from(m))?
            }
            tags::POS_INT32 | tags::NEG_INT32 => {
                let m = reader.read_u32_le("int32")?;
                fixed_int_event(tag == tags::NEG_INT32, u64::from(m))?
            }
            tags::POS_INT64 | tags::NEG_INT64 => {
                let m = reader.read_u64_le("int64")?;
                fixed_int_event(tag == tags::NEG_INT64, m)?
            }

            tags::FLOAT32 => {
                let value = reader.read_f32("float32")?;
                if value.is_nan() {
                    Event::Nan {
                        signaling: value.to_bits() & 0x0040_0000 == 0,
                    }
                } else {
                    Event::Float(f64::from(value))
                }
            }
            tags::FLOAT64 => {
                let value = reader.read_f64("float64")?;
                if value.is_nan() {
                    Event::Nan {
                        signaling: value.to_bits() & (1 << 51) == 0,
                    }
                } else {
                    Event::Float(value)
                }
            }
            tags::UID => Event::Uid(reader.read_array("UID")?),

            tags::MARKER => Event::Marker(self.read_marker_id(reader)?),
            tags::REFERENCE => Event::Reference(self.read_marker_id(reader)?),

            tags::COMMENT => Event::CommentBegin,
            tags::METADATA => Event::MetadataBegin,
            tags::MARKUP => Event::MarkupBegin,
            tags::MAP => Event::MapBegin,
            tags::LIST => Event::ListBegin,
            tags::END => Event::End,
            tags::FALSE => Event::Bool(false),
            tags::TRUE => Event::Bool(true),
            tags::NIL => Event::Nil,
            tags::PADDING => Event::Padding(1),

            0x80..=0x8F => {
                let len = usize::from(tag & 0x0F);
                Event::String(reader.read_str(len, "string")?)
            }
            tags::STRING => return self.read_array(reader, ArrayType::String),
            tags::RESOURCE_ID => return self.read_array(reader, ArrayType::ResourceId),
            tags::CUSTOM_BINARY => return self.read_array(reader, ArrayType::CustomBinary),
            tags::CUSTOM_TEXT => return self.read_array(reader, ArrayType::CustomText),
            tags::BYTES => return self.read_array(reader, ArrayType::Typed(ElementType::U8)),
            tags::COMMENT_TEXT => return self.read_array(reader, ArrayType::Comment),
            tags::TYPED_ARRAY => {
                let code = reader.read_byte("element type")?;
                let element = tags::element_from_code(code).ok_or(Error::MalformedEncoding {
                    context: "unknown typed array element type",
                })?;
                return self.read_array(reader, ArrayType::Typed(element));
            }

            tags::DATE => Event::Time(TimeValue::Date(read_date(reader)?)),
            tags::TIME => Event::Time(TimeValue::Time(read_time(reader)?)),
            tags::TIMESTAMP => {
                let date = read_date(reader)?;
                let time = read_time(reader)?;
                Event::Time(TimeValue::Timestamp(date, time))
            }

            _ => return Err(Error::InvalidTag { tag }),
        };
        self.emit(event)
    }

    fn read_marker_id(&self, reader: &mut Reader<'_>) -> Result<MarkerId, Error> {
        let header = reader.read_varint("marker id")?;
        if header & 1 == 0 {
            return Ok(MarkerId::Int(header >> 1));
        }
        let len = header >> 1;
        if len == 0 || len > self.limits.max_marker_id_length as u64 {
            return Err(Error::LimitExceeded {
                limit: "marker id length",
                value: len,
                max: self.limits.max_marker_id_length as u64,
            });
        }
        Ok(MarkerId::Name(reader.read_str(len as usize, "marker id")?))
    }

    /// Reads one chunk header and its data.
    fn read_chunk(&self, reader: &mut Reader<'_>, array_type: ArrayType) -> Result<(u64, bool, Vec<u8>), Error> {
        let header = reader.read_varint("array chunk header")?;
        let length = header >> 1;
        let is_final = header & 1 == 0;
        let bytes = array_type
            .byte_length(length)
            .filter(|bytes| *bytes <= self.limits.max_array_size)
            .ok_or(Error::LimitExceeded {
                limit: "array size",
                value: length,
                max: self.limits.max_array_size,
            })?;
        let data = reader.read_bytes(bytes as usize, "array data")?;
        Ok((length, is_final, data.to_vec()))
    }

    /// Reads the first chunk of an array.
    ///
    /// A single final chunk becomes one complete event; otherwise the array
    /// is delivered in chunk events and the decoder switches to chunk mode.
    fn read_array(&mut self, reader: &mut Reader<'_>, array_type: ArrayType) -> Result<(), Error> {
        let (length, is_final, data) = self.read_chunk(reader, array_type)?;
        if is_final {
            return self.emit(Event::from_array(array_type, length, data)?);
        }
        self.state = State::Chunks(array_type);
        self.emit(Event::ArrayBegin(array_type))?;
        self.emit(Event::ArrayChunk { length, is_final })?;
        if !data.is_empty() {
            self.emit(Event::ArrayData(data))?;
        }
        Ok(())
    }
}

fn read_decimal(reader: &mut Reader<'_>) -> Result<DecimalFloat, Error> {
    let header = reader.read_varint("decimal header")?;
    let exponent = i32::try_from(zigzag_decode(header >> 1)).map_err(|_| Error::MalformedEncoding {
        context: "decimal exponent out of range",
    })?;
    let coefficient = reader.read_big_varint(MAX_COEFFICIENT_BYTES, "decimal coefficient")?;
    Ok(DecimalFloat::new(header & 1 == 1, coefficient, exponent))
}

fn fixed_int_event(negative: bool, magnitude: u64) -> Result<Event, Error> {
    if negative && magnitude == 0 {
        return Err(Error::MalformedEncoding {
            context: "negative integer with zero magnitude",
        });
    }
    Ok(if !negative {
        Event::PositiveInt(magnitude)
    } else if magnitude <= 1 << 63 {
        Event::Int((magnitude as i64).wrapping_neg())
    } else {
        Event::BigInt(BigInt::new(true, BigUint::from_u64(magnitude)))
    })
}

fn integer_event(negative: bool, magnitude: BigUint) -> Result<Event, Error> {
    match magnitude.to_u64() {
        Some(m) => fixed_int_event(negative, m),
        None => Ok(Event::BigInt(BigInt::new(negative, magnitude))),
    }
}
