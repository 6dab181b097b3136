//! Property tests for both codecs.

use std::collections::BTreeMap;

use concise_encoding::{
    ArrayType, BigFloat, BigInt, BigUint, CbeDecoder, CteDecoder, Date, DecimalFloat, ElementType, Event, EventRecorder,
    Limits, MarkerId, Time, TimeValue, Zone, decode_cbe, decode_cte, decode_cte_with_limits, document,
    encode_cbe, encode_cte, replay,
};
use proptest::prelude::*;
use proptest::sample::Index;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Big(bool, u128),
    Decimal(bool, u128, i32),
    Float(f64),
    Nan(bool),
    Uid([u8; 16]),
    Time(TimeValue),
    Text(String),
    Resource(String),
    Bytes(Vec<u8>),
    Typed(ElementType, u64, Vec<u8>),
    List(Vec<Item>),
    Map(BTreeMap<String, Value>),
    Markup(Markup),
    Marked(MarkerId, Box<Value>),
    /// Reference to one of the markers defined so far.
    Ref(Index),
}

#[derive(Debug, Clone)]
enum Item {
    Value(Value),
    Comment(String),
    /// Metadata followed by the value it annotates.
    Meta(BTreeMap<String, Value>, Value),
}

#[derive(Debug, Clone)]
struct Markup {
    name: String,
    attributes: BTreeMap<String, Value>,
    content: Vec<Content>,
}

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Child(Markup),
}

/// Marker ids already defined while writing one document.
#[derive(Default)]
struct Markers {
    defined: Vec<MarkerId>,
    seen: FxHashSet<MarkerId>,
}

impl Value {
    fn write(&self, out: &mut Vec<Event>, markers: &mut Markers) {
        match self {
            Value::Nil => out.push(Event::Nil),
            Value::Bool(b) => out.push(Event::Bool(*b)),
            Value::Int(n) if *n >= 0 => out.push(Event::PositiveInt(*n as u64)),
            Value::Int(n) => out.push(Event::Int(*n)),
            Value::Big(negative, magnitude) => {
                out.push(Event::BigInt(BigInt::new(*negative, BigUint::from_u128(*magnitude))))
            }
            Value::Decimal(negative, coefficient, exponent) => out.push(Event::DecimalFloat(DecimalFloat::new(
                *negative,
                BigUint::from_u128(*coefficient),
                *exponent,
            ))),
            Value::Float(f) => out.push(Event::Float(*f)),
            Value::Nan(signaling) => out.push(Event::Nan { signaling: *signaling }),
            Value::Uid(uid) => out.push(Event::Uid(*uid)),
            Value::Time(t) => out.push(Event::Time(t.clone())),
            Value::Text(s) => out.push(Event::String(s.clone())),
            Value::Resource(s) => out.push(Event::ResourceId(s.clone())),
            Value::Bytes(b) => out.push(Event::Bytes(b.clone())),
            Value::Typed(element, length, data) => out.push(Event::Array {
                element: *element,
                length: *length,
                data: data.clone(),
            }),
            Value::List(items) => {
                out.push(Event::ListBegin);
                for item in items {
                    match item {
                        Item::Value(v) => v.write(out, markers),
                        Item::Comment(text) => {
                            out.push(Event::CommentBegin);
                            out.push(Event::CommentText(text.clone()));
                            out.push(Event::End);
                        }
                        Item::Meta(pairs, v) => {
                            out.push(Event::MetadataBegin);
                            write_pairs(pairs, out, markers);
                            out.push(Event::End);
                            v.write(out, markers);
                        }
                    }
                }
                out.push(Event::End);
            }
            Value::Map(pairs) => {
                out.push(Event::MapBegin);
                write_pairs(pairs, out, markers);
                out.push(Event::End);
            }
            Value::Markup(markup) => markup.write(out, markers),
            Value::Marked(id, v) => {
                // A marker must be followed by a plain value and used once
                let markable = !matches!(**v, Value::Marked(..) | Value::Ref(_));
                if markable && markers.seen.insert(id.clone()) {
                    out.push(Event::Marker(id.clone()));
                    markers.defined.push(id.clone());
                }
                v.write(out, markers);
            }
            Value::Ref(index) => match markers.defined.get(index.index(markers.defined.len().max(1))) {
                Some(id) => out.push(Event::Reference(id.clone())),
                None => out.push(Event::Nil),
            },
        }
    }

    fn events(&self) -> Vec<Event> {
        let mut body = Vec::new();
        self.write(&mut body, &mut Markers::default());
        document(body)
    }
}

fn write_pairs(pairs: &BTreeMap<String, Value>, out: &mut Vec<Event>, markers: &mut Markers) {
    for (k, v) in pairs {
        out.push(Event::String(k.clone()));
        v.write(out, markers);
    }
}

impl Markup {
    fn write(&self, out: &mut Vec<Event>, markers: &mut Markers) {
        out.push(Event::MarkupBegin);
        out.push(Event::String(self.name.clone()));
        write_pairs(&self.attributes, out, markers);
        out.push(Event::End);
        // Adjacent text reads back as one string
        let mut text = String::new();
        for item in &self.content {
            match item {
                Content::Text(t) => text.push_str(t),
                Content::Child(child) => {
                    if !text.is_empty() {
                        out.push(Event::String(std::mem::take(&mut text)));
                    }
                    child.write(out, markers);
                }
            }
        }
        if !text.is_empty() {
            out.push(Event::String(text));
        }
        out.push(Event::End);
    }
}

fn marker_id() -> impl Strategy<Value = MarkerId> {
    prop_oneof![
        3 => (0..=u64::MAX >> 1).prop_map(MarkerId::Int),
        1 => "[a-z][a-z0-9_]{0,6}".prop_map(MarkerId::Name),
    ]
}

fn zone() -> impl Strategy<Value = Zone> {
    prop_oneof![
        Just(Zone::Utc),
        prop::sample::select(vec!["Europe/Berlin", "America/New_York", "Asia/Tokyo"])
            .prop_map(|name| Zone::Area(name.to_string())),
        (-9000i16..=9000, -18000i16..=18000).prop_map(|(latitude, longitude)| Zone::LatLong {
            latitude,
            longitude
        }),
        (-1440i16..=1440).prop_map(Zone::Offset),
    ]
}

fn time_value() -> BoxedStrategy<TimeValue> {
    let date = (-9999i32..=9999, 1u8..=12, 1u8..=28)
        .prop_filter_map("year zero", |(year, month, day)| Date::new(year, month, day).ok())
        .boxed();
    let nanosecond = prop_oneof![
        Just(0u32),
        (1u32..1000).prop_map(|ms| ms * 1_000_000),
        (1u32..1_000_000).prop_map(|us| us * 1000),
        1u32..1_000_000_000,
    ];
    let time = (0u8..24, 0u8..60, 0u8..=60, nanosecond, zone())
        .prop_filter_map("valid time", |(hour, minute, second, ns, zone)| {
            Time::new(hour, minute, second, ns, zone).ok()
        })
        .boxed();
    prop_oneof![
        date.clone().prop_map(TimeValue::Date),
        time.clone().prop_map(TimeValue::Time),
        (date, time).prop_map(|(date, time)| TimeValue::Timestamp(date, time)),
    ]
    .boxed()
}

fn typed_array() -> impl Strategy<Value = Value> {
    fn typed<T: Arbitrary, const N: usize>(
        element: ElementType,
        to_bytes: fn(T) -> [u8; N],
    ) -> impl Strategy<Value = Value> {
        prop::collection::vec(any::<T>(), 0..6).prop_map(move |items| {
            let length = items.len() as u64;
            Value::Typed(element, length, items.into_iter().flat_map(to_bytes).collect())
        })
    }
    prop_oneof![
        typed(ElementType::U16, u16::to_le_bytes),
        typed(ElementType::I32, i32::to_le_bytes),
        typed(ElementType::I64, i64::to_le_bytes),
        typed(ElementType::Uid, |uid: [u8; 16]| uid),
        prop::collection::vec(-8000i64..8000, 0..6).prop_map(|items| {
            let length = items.len() as u64;
            let data = items.into_iter().flat_map(|n| (n as f64 / 8.0).to_le_bytes()).collect();
            Value::Typed(ElementType::F64, length, data)
        }),
    ]
}

/// Values written the same way by every decoder that reads them back.
fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (any::<bool>(), (1u128 << 64)..=u128::MAX).prop_map(|(negative, m)| Value::Big(negative, m)),
        // Over 20 significant digits with no trailing zero: never an exact f64
        (any::<bool>(), 10u128.pow(19)..10u128.pow(29), 1u128..=9, -50i32..50)
            .prop_map(|(negative, c, last, exponent)| Value::Decimal(negative, c * 10 + last, exponent)),
        (1i64..1_000_000, any::<bool>())
            .prop_map(|(n, negative)| Value::Float((if negative { -n } else { n }) as f64 / 8.0)),
        any::<bool>().prop_map(Value::Nan),
        any::<[u8; 16]>().prop_map(Value::Uid),
        time_value().prop_map(Value::Time),
        "[a-zA-Z0-9 _.-]{0,24}".prop_map(Value::Text),
        "[a-z:/.]{0,16}".prop_map(Value::Resource),
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Value::Bytes),
        typed_array(),
    ]
}

fn markup(inner: impl Strategy<Value = Value> + Clone) -> impl Strategy<Value = Value> {
    let name = "[a-z][a-z0-9]{0,5}";
    let attributes = prop::collection::btree_map("[a-z]{1,4}", inner, 0..3);
    let text = "[a-zA-Z ,.]{1,8}";
    let child = (name, attributes.clone(), prop::option::of(text)).prop_map(|(name, attributes, text)| Markup {
        name,
        attributes,
        content: text.map(Content::Text).into_iter().collect(),
    });
    let content = prop::collection::vec(
        prop_oneof![text.prop_map(Content::Text), child.prop_map(Content::Child)],
        0..4,
    );
    (name, attributes, content).prop_map(|(name, attributes, content)| {
        Value::Markup(Markup {
            name,
            attributes,
            content,
        })
    })
}

fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![6 => scalar(), 1 => any::<Index>().prop_map(Value::Ref)];
    leaf.prop_recursive(4, 64, 6, |inner| {
        let item = prop_oneof![
            4 => inner.clone().prop_map(Item::Value),
            1 => "[a-z ]{1,8}".prop_map(Item::Comment),
            1 => (prop::collection::btree_map("[a-z]{1,4}", inner.clone(), 0..3), inner.clone())
                .prop_map(|(pairs, v)| Item::Meta(pairs, v)),
        ];
        prop_oneof![
            prop::collection::vec(item, 0..6).prop_map(Value::List),
            prop::collection::btree_map("[a-z]{1,8}", inner.clone(), 0..6).prop_map(Value::Map),
            (marker_id(), inner.clone()).prop_map(|(id, v)| Value::Marked(id, Box::new(v))),
            markup(inner),
        ]
    })
}

fn coalesce(events: &[Event]) -> Vec<Event> {
    let mut recorder = EventRecorder::new();
    replay(events, &mut recorder).unwrap();
    recorder.into_events()
}

proptest! {
    #[test]
    fn test_cbe_round_trip(v in value()) {
        let events = v.events();
        let bytes = encode_cbe(&events).unwrap();
        prop_assert_eq!(decode_cbe(&bytes).unwrap(), events);
    }

    #[test]
    fn test_cte_round_trip(v in value()) {
        let events = v.events();
        let text = encode_cte(&events).unwrap();
        prop_assert_eq!(decode_cte(text.as_bytes()).unwrap(), events);
    }

    #[test]
    fn test_cte_big_float_round_trip(
        negative in any::<bool>(),
        significand in (1u128 << 60)..=u128::MAX,
        exponent in -200i32..200,
    ) {
        // Odd and wider than 53 bits, so never read back as an f64
        let value = BigFloat::new(negative, BigUint::from_u128(significand | 1), exponent);
        let events = document([Event::ListBegin, Event::BigFloat(value), Event::End]);
        let text = encode_cte(&events).unwrap();
        prop_assert_eq!(decode_cte(text.as_bytes()).unwrap(), events);
    }

    #[test]
    fn test_cbe_reencode_is_identical(v in value()) {
        let bytes = encode_cbe(&v.events()).unwrap();
        let again = encode_cbe(&decode_cbe(&bytes).unwrap()).unwrap();
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn test_cbe_split_feeding(v in value(), split in any::<Index>()) {
        let events = v.events();
        let bytes = encode_cbe(&events).unwrap();
        let split = split.index(bytes.len() + 1);

        let mut decoder = CbeDecoder::new(Vec::new(), Limits::default());
        decoder.feed(&bytes[..split]).unwrap();
        decoder.feed(&bytes[split..]).unwrap();
        prop_assert_eq!(decoder.finish().unwrap(), events);
    }

    #[test]
    fn test_cte_split_feeding(v in value(), split in any::<Index>()) {
        let events = v.events();
        let text = encode_cte(&events).unwrap();
        let split = split.index(text.len() + 1);

        let mut decoder = CteDecoder::new(Vec::new(), Limits::default());
        decoder.feed(&text.as_bytes()[..split]).unwrap();
        decoder.feed(&text.as_bytes()[split..]).unwrap();
        prop_assert_eq!(decoder.finish().unwrap(), events);
    }

    #[test]
    fn test_chunked_string_equivalence(s in "[a-zé€]{1,32}", split in any::<Index>()) {
        let split = split.index(s.len() + 1);
        let (first, second) = s.as_bytes().split_at(split);
        let chunked = document([
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk { length: first.len() as u64, is_final: false },
            Event::ArrayData(first.to_vec()),
            Event::ArrayChunk { length: second.len() as u64, is_final: true },
            Event::ArrayData(second.to_vec()),
        ]);
        let whole = document([Event::String(s.clone())]);

        let bytes = encode_cbe(&chunked).unwrap();
        prop_assert_eq!(coalesce(&decode_cbe(&bytes).unwrap()), whole.clone());

        let text = encode_cte(&chunked).unwrap();
        prop_assert_eq!(decode_cte(text.as_bytes()).unwrap(), whole);
    }

    #[test]
    fn test_depth_limit(depth in 1usize..32) {
        let limits = Limits::default().with_max_container_depth(depth);
        let nested = |n: usize| format!("c1 {}{}", "[".repeat(n), "]".repeat(n));
        prop_assert!(decode_cte_with_limits(nested(depth).as_bytes(), limits).is_ok());
        prop_assert!(decode_cte_with_limits(nested(depth + 1).as_bytes(), limits).is_err());
    }

    #[test]
    fn test_cte_decoder_never_panics(input in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut text = b"c1 ".to_vec();
        text.extend_from_slice(&input);
        let _ = decode_cte(&text);
    }

    #[test]
    fn test_cbe_decoder_never_panics(input in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&input);
        let _ = decode_cbe(&bytes);
    }
}
