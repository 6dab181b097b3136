//! Format constants and configurable decoding/encoding limits.
//!
//! Limits are an explicit value threaded through every encoder, decoder and
//! rules engine. There is no process-wide default that can be mutated.

/// The only document version this crate reads and writes.
pub const FORMAT_VERSION: u64 = 1;

/// Maximum bytes in a u64 varint (LEB128).
pub const MAX_VARINT_BYTES: usize = 10;

/// Default maximum container nesting depth.
pub const DEFAULT_MAX_CONTAINER_DEPTH: usize = 1000;

/// Default maximum byte count of a single array (1 GB).
pub const DEFAULT_MAX_ARRAY_SIZE: u64 = 1_000_000_000;

/// Default maximum byte length of a single string (100 MB).
pub const DEFAULT_MAX_STRING_LENGTH: u64 = 100_000_000;

/// Largest integer marker identifier; CBE stores ids shifted left by one.
pub const MAX_MARKER_INT_ID: u64 = u64::MAX >> 1;

/// Default maximum byte length of a string marker identifier.
pub const DEFAULT_MAX_MARKER_ID_LENGTH: usize = 100;

/// Resource limits applied while processing a document.
///
/// Exceeding any limit is reported as [`Error::LimitExceeded`](crate::Error::LimitExceeded);
/// data is never silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of simultaneously open containers.
    pub max_container_depth: usize,
    /// Maximum byte count of any array (strings, bytes, typed arrays).
    pub max_array_size: u64,
    /// Maximum byte length of any text array (strings, URIs, custom text, comments).
    pub max_string_length: u64,
    /// Maximum byte length of a string marker identifier.
    pub max_marker_id_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_container_depth: DEFAULT_MAX_CONTAINER_DEPTH,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_marker_id_length: DEFAULT_MAX_MARKER_ID_LENGTH,
        }
    }
}

impl Limits {
    /// Creates the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum container depth.
    pub fn with_max_container_depth(mut self, depth: usize) -> Self {
        self.max_container_depth = depth;
        self
    }

    /// Sets the maximum array byte count.
    pub fn with_max_array_size(mut self, size: u64) -> Self {
        self.max_array_size = size;
        self
    }

    /// Sets the maximum string byte length.
    pub fn with_max_string_length(mut self, len: u64) -> Self {
        self.max_string_length = len;
        self
    }

    /// Sets the maximum marker identifier length.
    pub fn with_max_marker_id_length(mut self, len: usize) -> Self {
        self.max_marker_id_length = len;
        self
    }
}
