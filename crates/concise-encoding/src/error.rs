//! Error types for Concise Encoding codecs and the rules engine.

use thiserror::Error;

/// Error categories.
///
/// Every [`Error`] belongs to exactly one category. Callers that only care
/// about the broad class of failure (for example to map it onto a protocol
/// status) should match on [`Error::kind`] instead of individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// E001: Event not legal in the current document state
    Structural,
    /// E002: Array byte count does not match its declared length
    DataLength,
    /// E003: Invalid UTF-8 or a disallowed character
    Encoding,
    /// E004: CTE tokenizer failure
    Lexical,
    /// E005: A configured limit was exceeded
    LimitExceeded,
    /// E006: Value cannot be represented in the target format
    UnsupportedType,
    /// E007: Malformed CBE data (bad tag, varint, field)
    Malformed,
    /// E008: Input ended in the middle of a document
    UnexpectedEndOfData,
}

impl ErrorKind {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Structural => "E001",
            ErrorKind::DataLength => "E002",
            ErrorKind::Encoding => "E003",
            ErrorKind::Lexical => "E004",
            ErrorKind::LimitExceeded => "E005",
            ErrorKind::UnsupportedType => "E006",
            ErrorKind::Malformed => "E007",
            ErrorKind::UnexpectedEndOfData => "E008",
        }
    }
}

/// Error raised while validating, encoding or decoding a document.
///
/// Once an operation returns an error, the instance that produced it is in an
/// undefined state and must be discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // === E001: Structural ===
    #[error("[E001] {event} is not allowed {context}")]
    UnexpectedEvent {
        event: &'static str,
        context: &'static str,
    },

    #[error("[E001] end of container with no open container")]
    UnbalancedEnd,

    #[error("[E001] {container} closed with a key that has no value")]
    MissingValue { container: &'static str },

    #[error("[E001] {kind} cannot be used as a map key")]
    InvalidMapKey { kind: &'static str },

    #[error("[E001] marker {id} is already defined")]
    DuplicateMarker { id: String },

    #[error("[E001] reference to marker {id} which is never defined")]
    UnresolvedReference { id: String },

    #[error("[E001] document ended with {depth} open container(s)")]
    UnclosedContainers { depth: usize },

    #[error("[E001] document contains no top-level value")]
    MissingTopLevelValue,

    #[error("[E001] unsupported version: {version}")]
    UnsupportedVersion { version: u64 },

    // === E002: Data length ===
    #[error("[E002] array data of {len} bytes exceeds the {remaining} bytes left in the chunk")]
    ArrayDataOverrun { len: usize, remaining: u64 },

    #[error("[E002] array chunk started with {remaining} bytes of the previous chunk outstanding")]
    ArrayChunkIncomplete { remaining: u64 },

    #[error("[E002] non-final bit array chunk of {bits} bits is not byte aligned")]
    MisalignedBitChunk { bits: u64 },

    #[error("[E002] {element} array of {length} elements needs {expected} bytes, found {actual}")]
    ArrayLengthMismatch {
        element: &'static str,
        length: u64,
        expected: u64,
        actual: usize,
    },

    // === E003: Encoding ===
    #[error("[E003] invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("[E003] character {character:?} is not allowed in a comment")]
    InvalidCommentCharacter { character: char },

    // === E004: Lexical ===
    #[error("[E004] line {line}, column {column}: {message}")]
    Lexical {
        line: usize,
        column: usize,
        message: String,
    },

    // === E005: Limits ===
    #[error("[E005] {limit} {value} exceeds maximum {max}")]
    LimitExceeded {
        limit: &'static str,
        value: u64,
        max: u64,
    },

    // === E006: Unsupported type ===
    #[error("[E006] {type_name} cannot be represented in {format}")]
    UnsupportedType {
        type_name: &'static str,
        format: &'static str,
    },

    // === E007: Malformed ===
    #[error("[E007] invalid type tag 0x{tag:02x}")]
    InvalidTag { tag: u8 },

    #[error("[E007] varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("[E007] varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("[E007] malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    #[error("[E007] invalid time value: {message}")]
    InvalidTime { message: String },

    // === E008: Truncation ===
    #[error("[E008] unexpected end of data while reading {context}")]
    UnexpectedEof { context: &'static str },
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedEvent { .. }
            | Error::UnbalancedEnd
            | Error::MissingValue { .. }
            | Error::InvalidMapKey { .. }
            | Error::DuplicateMarker { .. }
            | Error::UnresolvedReference { .. }
            | Error::UnclosedContainers { .. }
            | Error::MissingTopLevelValue
            | Error::UnsupportedVersion { .. } => ErrorKind::Structural,
            Error::ArrayDataOverrun { .. }
            | Error::ArrayChunkIncomplete { .. }
            | Error::MisalignedBitChunk { .. }
            | Error::ArrayLengthMismatch { .. } => ErrorKind::DataLength,
            Error::InvalidUtf8 { .. } | Error::InvalidCommentCharacter { .. } => {
                ErrorKind::Encoding
            }
            Error::Lexical { .. } => ErrorKind::Lexical,
            Error::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Error::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Error::InvalidTag { .. }
            | Error::VarintTooLong
            | Error::VarintOverflow
            | Error::MalformedEncoding { .. }
            | Error::InvalidTime { .. } => ErrorKind::Malformed,
            Error::UnexpectedEof { .. } => ErrorKind::UnexpectedEndOfData,
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Returns true if more input could turn this failure into a success.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Error::UnexpectedEof { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_kinds() {
        let err = Error::InvalidMapKey { kind: "nil" };
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.code(), "E001");
        assert!(err.to_string().starts_with("[E001]"));

        let err = Error::LimitExceeded {
            limit: "container depth",
            value: 11,
            max: 10,
        };
        assert_eq!(err.code(), "E005");
        assert_eq!(err.to_string(), "[E005] container depth 11 exceeds maximum 10");
    }

    #[test]
    fn test_end_of_data() {
        assert!(Error::UnexpectedEof { context: "tag" }.is_end_of_data());
        assert!(!Error::VarintTooLong.is_end_of_data());
        assert_eq!(
            Error::UnexpectedEof { context: "tag" }.kind(),
            ErrorKind::UnexpectedEndOfData
        );
    }
}
