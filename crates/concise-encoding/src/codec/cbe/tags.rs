//! CBE type tags and typed-array element codes.

use crate::event::{ArrayType, ElementType};

/// Largest integer encoded directly in its tag byte.
pub const SMALL_INT_MAX: u8 = 100;
/// Tag of the smallest negative integer encoded directly (-100).
pub const SMALL_NEG_INT_MIN: u8 = 0x9C;

pub const DECIMAL_FLOAT: u8 = 0x65;
pub const POS_BIG_INT: u8 = 0x66;
pub const NEG_BIG_INT: u8 = 0x67;
pub const POS_INT8: u8 = 0x68;
pub const NEG_INT8: u8 = 0x69;
pub const POS_INT16: u8 = 0x6A;
pub const NEG_INT16: u8 = 0x6B;
pub const POS_INT32: u8 = 0x6C;
pub const NEG_INT32: u8 = 0x6D;
pub const POS_INT64: u8 = 0x6E;
pub const NEG_INT64: u8 = 0x6F;
pub const FLOAT32: u8 = 0x70;
pub const FLOAT64: u8 = 0x71;
pub const UID: u8 = 0x72;
pub const MARKER: u8 = 0x73;
pub const REFERENCE: u8 = 0x74;
pub const COMMENT: u8 = 0x75;
pub const METADATA: u8 = 0x76;
pub const MARKUP: u8 = 0x77;
pub const MAP: u8 = 0x78;
pub const LIST: u8 = 0x79;
pub const END: u8 = 0x7A;
pub const FALSE: u8 = 0x7B;
pub const TRUE: u8 = 0x7C;
pub const NIL: u8 = 0x7D;
pub const PADDING: u8 = 0x7F;

/// Short strings: low nibble is the byte length (0..=15).
pub const SHORT_STRING: u8 = 0x80;
pub const SHORT_STRING_MAX_LEN: usize = 15;

pub const STRING: u8 = 0x90;
pub const RESOURCE_ID: u8 = 0x91;
pub const CUSTOM_BINARY: u8 = 0x92;
pub const CUSTOM_TEXT: u8 = 0x93;
pub const BYTES: u8 = 0x94;
pub const COMMENT_TEXT: u8 = 0x95;
pub const TYPED_ARRAY: u8 = 0x96;

pub const DATE: u8 = 0x99;
pub const TIME: u8 = 0x9A;
pub const TIMESTAMP: u8 = 0x9B;

/// Quiet NaN as a float32 bit pattern.
pub const QUIET_NAN_BITS: u32 = 0x7FC0_0000;
/// Signaling NaN as a float32 bit pattern.
pub const SIGNALING_NAN_BITS: u32 = 0x7FA0_0000;

/// Returns the typed-array element code.
pub fn element_code(element: ElementType) -> u8 {
    match element {
        ElementType::Bit => 0x00,
        ElementType::U8 => 0x01,
        ElementType::U16 => 0x02,
        ElementType::U32 => 0x03,
        ElementType::U64 => 0x04,
        ElementType::I8 => 0x05,
        ElementType::I16 => 0x06,
        ElementType::I32 => 0x07,
        ElementType::I64 => 0x08,
        ElementType::F16 => 0x09,
        ElementType::F32 => 0x0A,
        ElementType::F64 => 0x0B,
        ElementType::Uid => 0x0C,
    }
}

/// Parses a typed-array element code.
pub fn element_from_code(code: u8) -> Option<ElementType> {
    Some(match code {
        0x00 => ElementType::Bit,
        0x01 => ElementType::U8,
        0x02 => ElementType::U16,
        0x03 => ElementType::U32,
        0x04 => ElementType::U64,
        0x05 => ElementType::I8,
        0x06 => ElementType::I16,
        0x07 => ElementType::I32,
        0x08 => ElementType::I64,
        0x09 => ElementType::F16,
        0x0A => ElementType::F32,
        0x0B => ElementType::F64,
        0x0C => ElementType::Uid,
        _ => return None,
    })
}

/// Returns the array tag for a chunked array type.
///
/// Typed arrays other than bytes are followed by their element code.
pub fn array_tag(array_type: ArrayType) -> u8 {
    match array_type {
        ArrayType::String => STRING,
        ArrayType::ResourceId => RESOURCE_ID,
        ArrayType::CustomBinary => CUSTOM_BINARY,
        ArrayType::CustomText => CUSTOM_TEXT,
        ArrayType::Comment => COMMENT_TEXT,
        ArrayType::Typed(ElementType::U8) => BYTES,
        ArrayType::Typed(_) => TYPED_ARRAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_codes_roundtrip() {
        for code in 0x00..=0x0C {
            let element = element_from_code(code).unwrap();
            assert_eq!(element_code(element), code);
        }
        assert!(element_from_code(0x0D).is_none());
    }

    #[test]
    fn test_small_int_ranges_do_not_overlap_tags() {
        assert!(SMALL_INT_MAX < DECIMAL_FLOAT);
        assert!(TIMESTAMP < SMALL_NEG_INT_MIN);
        assert_eq!(SMALL_NEG_INT_MIN as i8, -100);
    }
}
