//! CBE encoder: an event sink that writes the binary format.
//!
//! The encoder trusts its input ordering; wrap it in a
//! [`Rules`](crate::rules::Rules) (as [`encode_cbe`](super::encode_cbe)
//! does) to reject malformed event streams.

use super::tags;
use super::time::write_time_value;
use crate::codec::primitives::{Writer, zigzag_encode};
use crate::error::Error;
use crate::event::{ArrayType, BigFloat, DecimalFloat, ElementType, Event, EventSink, MarkerId};
use crate::util::bigint::BigInt;

/// Event sink producing CBE bytes.
#[derive(Debug, Clone, Default)]
pub struct CbeEncoder {
    writer: Writer,
}

impl CbeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    /// Writes an integer in the smallest form that holds its magnitude.
    fn write_integer(&mut self, negative: bool, magnitude: u64) {
        let w = &mut self.writer;
        if !negative && magnitude <= u64::from(tags::SMALL_INT_MAX) {
            w.write_byte(magnitude as u8);
            return;
        }
        if negative && (1..=100).contains(&magnitude) {
            w.write_byte((magnitude as i8).wrapping_neg() as u8);
            return;
        }
        let sign = u8::from(negative);
        if magnitude <= u64::from(u8::MAX) {
            w.write_byte(tags::POS_INT8 + sign);
            w.write_byte(magnitude as u8);
        } else if magnitude <= u64::from(u16::MAX) {
            w.write_byte(tags::POS_INT16 + sign);
            w.write_u16_le(magnitude as u16);
        } else if magnitude <= u64::from(u32::MAX) {
            w.write_byte(tags::POS_INT32 + sign);
            w.write_u32_le(magnitude as u32);
        } else {
            w.write_byte(tags::POS_INT64 + sign);
            w.write_u64_le(magnitude);
        }
    }

    fn write_big_int(&mut self, value: &BigInt) {
        if let Some(magnitude) = value.magnitude().to_u64() {
            self.write_integer(value.is_negative(), magnitude);
            return;
        }
        let bytes = value.magnitude().to_le_bytes();
        self.writer.write_byte(if value.is_negative() {
            tags::NEG_BIG_INT
        } else {
            tags::POS_BIG_INT
        });
        self.writer.write_varint(bytes.len() as u64);
        self.writer.write_bytes(&bytes);
    }

    /// Writes a float as float32 when that loses nothing, else float64.
    fn write_float(&mut self, value: f64) {
        if value.is_nan() {
            // Quiet bit of an f64 NaN
            self.write_nan(value.to_bits() & (1 << 51) == 0);
            return;
        }
        let narrow = value as f32;
        if f64::from(narrow) == value {
            self.writer.write_byte(tags::FLOAT32);
            self.writer.write_f32(narrow);
        } else {
            self.writer.write_byte(tags::FLOAT64);
            self.writer.write_f64(value);
        }
    }

    fn write_nan(&mut self, signaling: bool) {
        self.writer.write_byte(tags::FLOAT32);
        self.writer.write_u32_le(if signaling {
            tags::SIGNALING_NAN_BITS
        } else {
            tags::QUIET_NAN_BITS
        });
    }

    fn write_decimal(&mut self, value: &DecimalFloat) {
        let header = (zigzag_encode(i64::from(value.exponent())) << 1) | u64::from(value.is_negative());
        self.writer.write_byte(tags::DECIMAL_FLOAT);
        self.writer.write_varint(header);
        self.writer.write_big_varint(value.coefficient());
    }

    fn write_big_float(&mut self, value: &BigFloat) -> Result<(), Error> {
        if let Some(exact) = value.to_f64_exact() {
            self.write_float(exact);
            return Ok(());
        }
        let decimal = value.to_decimal().ok_or(Error::UnsupportedType {
            type_name: "binary float with an exponent this large",
            format: "CBE",
        })?;
        self.write_decimal(&decimal);
        Ok(())
    }

    // =========================================================================
    // Arrays and identifiers
    // =========================================================================

    fn write_array_start(&mut self, array_type: ArrayType) {
        self.writer.write_byte(tags::array_tag(array_type));
        if let ArrayType::Typed(element) = array_type {
            if element != ElementType::U8 {
                self.writer.write_byte(tags::element_code(element));
            }
        }
    }

    fn write_chunk_header(&mut self, length: u64, is_final: bool) -> Result<(), Error> {
        let shifted = length.checked_mul(2).ok_or(Error::LimitExceeded {
            limit: "array chunk length",
            value: length,
            max: u64::MAX >> 1,
        })?;
        self.writer.write_varint(shifted | u64::from(!is_final));
        Ok(())
    }

    /// Writes a complete array as a single final chunk.
    fn write_array(&mut self, array_type: ArrayType, length: u64, data: &[u8]) -> Result<(), Error> {
        self.write_array_start(array_type);
        self.write_chunk_header(length, true)?;
        self.writer.write_bytes(data);
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<(), Error> {
        if s.len() <= tags::SHORT_STRING_MAX_LEN {
            self.writer.write_byte(tags::SHORT_STRING | s.len() as u8);
            self.writer.write_bytes(s.as_bytes());
            return Ok(());
        }
        self.write_array(ArrayType::String, s.len() as u64, s.as_bytes())
    }

    fn write_marker_id(&mut self, id: &MarkerId) -> Result<(), Error> {
        match id {
            MarkerId::Int(n) => {
                let shifted = n.checked_mul(2).ok_or(Error::LimitExceeded {
                    limit: "marker id",
                    value: *n,
                    max: u64::MAX >> 1,
                })?;
                self.writer.write_varint(shifted);
            }
            MarkerId::Name(name) => {
                self.writer.write_varint(((name.len() as u64) << 1) | 1);
                self.writer.write_bytes(name.as_bytes());
            }
        }
        Ok(())
    }
}

impl EventSink for CbeEncoder {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        match &event {
            Event::BeginDocument | Event::EndDocument => {}
            Event::Version(version) => self.writer.write_varint(*version),
            Event::Padding(count) => {
                for _ in 0..*count {
                    self.writer.write_byte(tags::PADDING);
                }
            }

            Event::Nil => self.writer.write_byte(tags::NIL),
            Event::Bool(b) => self.writer.write_byte(if *b { tags::TRUE } else { tags::FALSE }),
            Event::Int(n) => self.write_integer(*n < 0, n.unsigned_abs()),
            Event::PositiveInt(n) => self.write_integer(false, *n),
            Event::BigInt(n) => self.write_big_int(n),
            Event::Float(f) => self.write_float(*f),
            Event::BigFloat(f) => self.write_big_float(f)?,
            Event::DecimalFloat(d) => self.write_decimal(d),
            Event::Nan { signaling } => self.write_nan(*signaling),
            Event::Uid(uid) => {
                self.writer.write_byte(tags::UID);
                self.writer.write_bytes(uid);
            }
            Event::Time(value) => write_time_value(&mut self.writer, value)?,

            Event::String(s) => self.write_string(s)?,
            Event::ResourceId(s) => self.write_array(ArrayType::ResourceId, s.len() as u64, s.as_bytes())?,
            Event::CustomText(s) => self.write_array(ArrayType::CustomText, s.len() as u64, s.as_bytes())?,
            Event::CommentText(s) => self.write_array(ArrayType::Comment, s.len() as u64, s.as_bytes())?,
            Event::Bytes(data) => {
                self.write_array(ArrayType::Typed(ElementType::U8), data.len() as u64, data)?
            }
            Event::CustomBinary(data) => self.write_array(ArrayType::CustomBinary, data.len() as u64, data)?,
            Event::Array {
                element,
                length,
                data,
            } => self.write_array(ArrayType::Typed(*element), *length, data)?,

            Event::ListBegin => self.writer.write_byte(tags::LIST),
            Event::MapBegin => self.writer.write_byte(tags::MAP),
            Event::MarkupBegin => self.writer.write_byte(tags::MARKUP),
            Event::MetadataBegin => self.writer.write_byte(tags::METADATA),
            Event::CommentBegin => self.writer.write_byte(tags::COMMENT),
            Event::End => self.writer.write_byte(tags::END),

            Event::ArrayBegin(array_type) => self.write_array_start(*array_type),
            Event::ArrayChunk { length, is_final } => self.write_chunk_header(*length, *is_final)?,
            Event::ArrayData(data) => self.writer.write_bytes(data),

            Event::Marker(id) => {
                self.writer.write_byte(tags::MARKER);
                self.write_marker_id(id)?;
            }
            Event::Reference(id) => {
                self.writer.write_byte(tags::REFERENCE);
                self.write_marker_id(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::bigint::BigUint;

    fn encode(events: &[Event]) -> Vec<u8> {
        let mut encoder = CbeEncoder::new();
        for event in events {
            encoder.event(event.clone()).unwrap();
        }
        encoder.into_bytes()
    }

    #[test]
    fn test_small_integers() {
        assert_eq!(encode(&[Event::PositiveInt(0)]), vec![0x00]);
        assert_eq!(encode(&[Event::PositiveInt(100)]), vec![0x64]);
        assert_eq!(encode(&[Event::Int(-1)]), vec![0xFF]);
        assert_eq!(encode(&[Event::Int(-100)]), vec![0x9C]);
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(encode(&[Event::PositiveInt(101)]), vec![0x68, 0x65]);
        assert_eq!(encode(&[Event::Int(-101)]), vec![0x69, 0x65]);
        assert_eq!(encode(&[Event::PositiveInt(0x100)]), vec![0x6A, 0x00, 0x01]);
        assert_eq!(
            encode(&[Event::PositiveInt(0x10000)]),
            vec![0x6C, 0x00, 0x00, 0x01, 0x00]
        );
        assert_eq!(
            encode(&[Event::Int(i64::MIN)]),
            vec![0x6F, 0, 0, 0, 0, 0, 0, 0, 0x80]
        );
    }

    #[test]
    fn test_big_int() {
        let value = BigInt::new(false, BigUint::from_u128(1u128 << 64));
        assert_eq!(
            encode(&[Event::BigInt(value)]),
            vec![0x66, 0x09, 0, 0, 0, 0, 0, 0, 0, 0, 0x01]
        );
        // Fits in 64 bits: written compactly
        assert_eq!(encode(&[Event::BigInt(BigInt::from_i64(-5))]), vec![0xFB]);
    }

    #[test]
    fn test_float_narrowing() {
        assert_eq!(
            encode(&[Event::Float(-967234.125)]),
            vec![0x70, 0x22, 0x24, 0x6C, 0xC9]
        );
        let bytes = encode(&[Event::Float(0.1)]);
        assert_eq!(bytes[0], 0x71);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn test_nan() {
        assert_eq!(
            encode(&[Event::Nan { signaling: false }]),
            vec![0x70, 0x00, 0x00, 0xC0, 0x7F]
        );
        assert_eq!(
            encode(&[Event::Nan { signaling: true }]),
            vec![0x70, 0x00, 0x00, 0xA0, 0x7F]
        );
        assert_eq!(
            encode(&[Event::Float(f64::NAN)]),
            vec![0x70, 0x00, 0x00, 0xC0, 0x7F]
        );
    }

    #[test]
    fn test_decimal() {
        // -1.5 = -15e-1: zigzag(-1) = 1, header = 1 << 1 | 1
        let value = DecimalFloat::from_parts(true, 15, -1);
        assert_eq!(encode(&[Event::DecimalFloat(value)]), vec![0x65, 0x03, 0x0F]);
    }

    #[test]
    fn test_big_float() {
        let exact = BigFloat::new(false, BigUint::from_u64(3), -1);
        assert_eq!(encode(&[Event::BigFloat(exact)]), encode(&[Event::Float(1.5)]));

        // 2^70 + 1 needs 71 bits: written as a decimal
        let mut significand = BigUint::from_u64(1);
        significand.shl(70);
        significand.add_small(1);
        let bytes = encode(&[Event::BigFloat(BigFloat::new(false, significand, 0))]);
        assert_eq!(bytes[0], tags::DECIMAL_FLOAT);
    }

    #[test]
    fn test_strings() {
        assert_eq!(encode(&[Event::String("hi".to_string())]), vec![0x82, b'h', b'i']);
        let long = "a".repeat(16);
        let bytes = encode(&[Event::String(long)]);
        assert_eq!(&bytes[..2], &[0x90, 0x20]);
        assert_eq!(bytes.len(), 18);
    }

    #[test]
    fn test_chunked_array() {
        let bytes = encode(&[
            Event::ArrayBegin(ArrayType::Typed(ElementType::U16)),
            Event::ArrayChunk {
                length: 1,
                is_final: false,
            },
            Event::ArrayData(vec![1, 0]),
            Event::ArrayChunk {
                length: 1,
                is_final: true,
            },
            Event::ArrayData(vec![2, 0]),
        ]);
        assert_eq!(bytes, vec![0x96, 0x02, 0x03, 1, 0, 0x02, 2, 0]);
    }

    #[test]
    fn test_marker_ids() {
        assert_eq!(
            encode(&[Event::Marker(MarkerId::Int(1))]),
            vec![0x73, 0x02]
        );
        assert_eq!(
            encode(&[Event::Reference(MarkerId::Name("ab".to_string()))]),
            vec![0x74, 0x05, b'a', b'b']
        );

        let mut encoder = CbeEncoder::new();
        assert!(matches!(
            encoder.event(Event::Marker(MarkerId::Int(1 << 63))),
            Err(Error::LimitExceeded { limit: "marker id", .. })
        ));
    }
}
