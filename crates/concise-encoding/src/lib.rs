//! Concise Encoding: a binary (CBE) and a text (CTE) format carrying the same
//! ad-hoc data model.
//!
//! Both formats are read and written as a stream of [`Event`]s. Every decoder
//! runs its output through a [`Rules`] engine, which enforces document
//! structure, marker and reference rules, and resource [`Limits`] before any
//! event reaches the caller.
//!
//! # Quick Start
//!
//! ```rust
//! use concise_encoding::{Event, decode_cbe, decode_cte, encode_cbe, encode_cte};
//!
//! let events = decode_cte(b"c1\n{name=Alice tags=[admin @true]}").unwrap();
//! assert_eq!(events[2], Event::MapBegin);
//!
//! // Same document in binary form
//! let bytes = encode_cbe(&events).unwrap();
//! assert_eq!(&bytes[..2], &[0x01, 0x78]);
//! assert_eq!(decode_cbe(&bytes).unwrap(), events);
//!
//! assert_eq!(encode_cte(&events).unwrap(), "c1\n{name=Alice tags=[admin @true]}");
//! ```
//!
//! # Modules
//!
//! - [`event`]: Event model, sinks and recorders
//! - [`rules`]: Structural validation of event streams
//! - [`codec`]: CBE and CTE encoders and decoders
//! - [`resolve`]: Marker/reference resolution into a node graph
//! - [`util`]: UTF-8 validation, big integers and temporal values
//! - [`error`]: Error types
//! - [`limits`]: Resource limits for decoding
//!
//! # Security
//!
//! Decoders are designed to handle untrusted input:
//! - Container depth, array sizes, string lengths and marker ids are bounded
//! - Varints, big integers and exponents are limited to prevent overflow
//! - Array lengths are checked before any payload is buffered
//! - Invalid data is rejected with a positioned, descriptive error

pub mod codec;
pub mod error;
pub mod event;
pub mod limits;
pub mod resolve;
pub mod rules;
pub mod util;

// Re-export commonly used types at crate root
pub use codec::{
    CbeDecoder, CbeEncoder, CteDecoder, CteEncoder, decode_cbe, decode_cbe_with_limits, decode_cte,
    decode_cte_with_limits, encode_cbe, encode_cbe_with_limits, encode_cte, encode_cte_with_limits,
};
pub use error::{Error, ErrorKind};
pub use event::{
    ArrayType, BigFloat, DecimalFloat, ElementType, Event, EventRecorder, EventSink, MarkerId, document,
    replay,
};
pub use limits::{FORMAT_VERSION, Limits};
pub use resolve::{Document, DocumentBuilder, Node, NodeId};
pub use rules::Rules;
pub use util::{BigInt, BigUint, Date, Time, TimeValue, Utf8Validator, Zone};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
