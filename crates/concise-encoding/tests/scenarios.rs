//! End-to-end scenarios across both codecs, the rules engine and the resolver.

use concise_encoding::{
    CbeDecoder, CteDecoder, Document, Error, ErrorKind, Event, EventRecorder, Limits, MarkerId, Node, decode_cbe,
    decode_cbe_with_limits, decode_cte, decode_cte_with_limits, document, encode_cbe, encode_cte, replay,
};

fn s(text: &str) -> Event {
    Event::String(text.to_string())
}

fn coalesce(events: &[Event]) -> Vec<Event> {
    let mut recorder = EventRecorder::new();
    replay(events, &mut recorder).unwrap();
    recorder.into_events()
}

// =============================================================================
// CBE
// =============================================================================

#[test]
fn test_float32_bytes() {
    let bytes = encode_cbe(&document([Event::Float(-967234.125)])).unwrap();
    assert_eq!(bytes, vec![0x01, 0x70, 0x22, 0x24, 0x6c, 0xc9]);
}

#[test]
fn test_smallest_integer_width() {
    let encode = |n: u64| encode_cbe(&document([Event::PositiveInt(n)])).unwrap();
    assert_eq!(encode(100), vec![0x01, 0x64]);
    assert_eq!(encode(101), vec![0x01, 0x68, 0x65]);
    assert_eq!(encode(0x10000), vec![0x01, 0x6c, 0x00, 0x00, 0x01, 0x00]);
}

#[test]
fn test_chunked_string_equivalence() {
    let whole = [0x01, 0x90, 0x06, b'a', b'b', b'c'];
    let split = [0x01, 0x90, 0x03, b'a', 0x04, b'b', b'c'];

    let whole = decode_cbe(&whole).unwrap();
    assert_eq!(whole, document([s("abc")]));
    let split = decode_cbe(&split).unwrap();
    assert_ne!(split, whole);
    assert_eq!(coalesce(&split), whole);
}

#[test]
fn test_feed_boundaries_do_not_change_events() {
    let text = b"c1 {list=[1 -2 3.5 \"a longer string value\"] map={k=v} when=2024-05-01}";
    let events = decode_cte(text).unwrap();
    let bytes = encode_cbe(&events).unwrap();

    for split in 0..=bytes.len() {
        let mut decoder = CbeDecoder::new(Vec::new(), Limits::default());
        decoder.feed(&bytes[..split]).unwrap();
        decoder.feed(&bytes[split..]).unwrap();
        assert_eq!(decoder.finish().unwrap(), events, "split at {}", split);
    }
}

#[test]
fn test_truncated_input() {
    let bytes = encode_cbe(&document([s("a longer string value")])).unwrap();
    let err = decode_cbe(&bytes[..bytes.len() - 3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfData);
    assert_eq!(err.kind().code(), "E008");

    // Input ending between items of an open container is truncated too
    let err = decode_cbe(&[0x01, 0x79, 0x01]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfData);
    let err = decode_cte(b"c1 {a=1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfData);
}

#[test]
fn test_reencode_is_byte_identical() {
    let events = decode_cte(b"c1 <p class=intro|Hello <b|world>> ").unwrap();
    let bytes = encode_cbe(&events).unwrap();
    let again = encode_cbe(&decode_cbe(&bytes).unwrap()).unwrap();
    assert_eq!(again, bytes);
}

// =============================================================================
// CTE
// =============================================================================

#[test]
fn test_decode_integer_map() {
    let events = decode_cte(b"c1 {1=2 3=4}").unwrap();
    assert_eq!(
        events,
        document([
            Event::MapBegin,
            Event::PositiveInt(1),
            Event::PositiveInt(2),
            Event::PositiveInt(3),
            Event::PositiveInt(4),
            Event::End,
        ])
    );
}

#[test]
fn test_encode_empty_list() {
    let text = encode_cte(&document([Event::ListBegin, Event::End])).unwrap();
    assert_eq!(text, "c1\n[]");
}

#[test]
fn test_text_to_binary_to_text() {
    let text = "c1\n{name=Alice tags=[admin @true 31] ratio=0.25 id=123e4567-e89b-12d3-a456-426614174000}";
    let events = decode_cte(text.as_bytes()).unwrap();
    let bytes = encode_cbe(&events).unwrap();
    assert_eq!(encode_cte(&decode_cbe(&bytes).unwrap()).unwrap(), text);
}

#[test]
fn test_text_feed_boundaries_do_not_change_events() {
    let text = "c1 {list=[1, -2, 3.5, \"a longer string value\"] /* note */ map={k=v} when=2024-05-01}";
    let events = decode_cte(text.as_bytes()).unwrap();

    for split in 0..=text.len() {
        let mut decoder = CteDecoder::new(Vec::new(), Limits::default());
        decoder.feed(&text.as_bytes()[..split]).unwrap();
        decoder.feed(&text.as_bytes()[split..]).unwrap();
        assert_eq!(decoder.finish().unwrap(), events, "split at {}", split);
    }
}

#[test]
fn test_lexical_error_position() {
    let err = decode_cte(b"c1\n[\n  1 ?]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lexical);
    assert!(matches!(err, Error::Lexical { line: 3, .. }));
}

// =============================================================================
// RULES
// =============================================================================

#[test]
fn test_depth_limit_in_both_codecs() {
    let limits = Limits::default().with_max_container_depth(3);
    let nested = b"c1 [[[1]]]";
    let too_deep = b"c1 [[[[1]]]]";

    assert!(decode_cte_with_limits(nested, limits).is_ok());
    let err = decode_cte_with_limits(too_deep, limits).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);

    let nested = encode_cbe(&decode_cte(nested).unwrap()).unwrap();
    let too_deep = encode_cbe(&decode_cte(too_deep).unwrap()).unwrap();
    assert!(decode_cbe_with_limits(&nested, limits).is_ok());
    let err = decode_cbe_with_limits(&too_deep, limits).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
}

#[test]
fn test_map_alternation() {
    assert!(decode_cte(b"c1 {a=1 b=2}").is_ok());
    assert_eq!(
        decode_cte(b"c1 {a=1 b}").unwrap_err(),
        Error::MissingValue { container: "map" }
    );
    assert!(matches!(
        decode_cte(b"c1 {@nil=1}").unwrap_err(),
        Error::InvalidMapKey { .. }
    ));
    assert!(matches!(
        decode_cte(b"c1 {[]=1}").unwrap_err(),
        Error::InvalidMapKey { .. }
    ));
}

#[test]
fn test_string_length_limit() {
    let limits = Limits {
        max_string_length: 4,
        ..Limits::default()
    };
    assert!(decode_cte_with_limits(b"c1 abcd", limits).is_ok());
    let err = decode_cte_with_limits(b"c1 abcde", limits).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);

    let bytes = encode_cbe(&document([s("abcde")])).unwrap();
    let err = decode_cbe_with_limits(&bytes, limits).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
}

#[test]
fn test_unresolved_reference() {
    let err = decode_cte(b"c1 [#missing]").unwrap_err();
    assert_eq!(
        err,
        Error::UnresolvedReference {
            id: "missing".to_string()
        }
    );
}

// =============================================================================
// MARKERS AND REFERENCES
// =============================================================================

#[test]
fn test_self_reference_resolves_to_enclosing_map() {
    let events = decode_cte(b"c1 &1 {Value=100, Next=#1}").unwrap();
    assert_eq!(events[2], Event::Marker(MarkerId::Int(1)));

    // Same document through the binary form
    let events = decode_cbe(&encode_cbe(&events).unwrap()).unwrap();
    let doc = Document::from_events(&events).unwrap();
    let root = doc.root();
    assert!(matches!(doc.node(root), Some(Node::Map(_))));
    assert_eq!(doc.map_get(root, "Next"), Some(root));

    let value = doc.map_get(root, "Value").unwrap();
    assert_eq!(doc.node(value), Some(&Node::Scalar(Event::PositiveInt(100))));
}

#[test]
fn test_reference_as_map_key() {
    let events = decode_cte(b"c1 [&k key {#k=1}]").unwrap();
    let doc = Document::from_events(&events).unwrap();
    let Some(Node::List(items)) = doc.node(doc.root()) else {
        panic!("expected a list");
    };
    assert_eq!(doc.map_get(items[1], "key").map(|id| doc.node(id)), Some(Some(&Node::Scalar(Event::PositiveInt(1)))));
}

#[test]
fn test_duplicate_marker_rejected() {
    let err = decode_cte(b"c1 [&a 1 &a 2]").unwrap_err();
    assert_eq!(err, Error::DuplicateMarker { id: "a".to_string() });
}

#[test]
fn test_large_integer_marker_ids() {
    let events = decode_cte(b"c1 [&9223372036854775807 1 #9223372036854775807]").unwrap();
    assert_eq!(events[3], Event::Marker(MarkerId::Int(u64::MAX >> 1)));
    assert_eq!(decode_cbe(&encode_cbe(&events).unwrap()).unwrap(), events);

    // Ids that cannot survive the binary form are refused up front
    let err = decode_cte(b"c1 [&0 1 &9223372036854775808 2]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    let err = encode_cbe(&document([
        Event::ListBegin,
        Event::Marker(MarkerId::Int(1 << 63)),
        Event::Nil,
        Event::End,
    ]))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
}
