//! Utility modules shared by the codecs.

pub mod bigint;
pub mod datetime;
pub mod utf8;

pub use bigint::{BigInt, BigUint};
pub use datetime::{Date, DateTimeParseError, Time, TimeValue, Zone};
pub use utf8::Utf8Validator;
