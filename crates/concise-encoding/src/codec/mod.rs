//! Binary (CBE) and text (CTE) codecs.
//!
//! Both formats carry the same event stream. Decoders push events through a
//! [`Rules`](crate::rules::Rules) engine into any [`EventSink`](crate::event::EventSink);
//! encoders are themselves event sinks.

pub mod cbe;
pub mod cte;
pub mod primitives;

pub use cbe::{CbeDecoder, CbeEncoder, decode_cbe, decode_cbe_with_limits, encode_cbe, encode_cbe_with_limits};
pub use cte::{CteDecoder, CteEncoder, decode_cte, decode_cte_with_limits, encode_cte, encode_cte_with_limits};
pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
