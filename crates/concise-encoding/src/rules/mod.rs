//! Rules engine: validates an event stream against the document structure.
//!
//! [`Rules`] is an [`EventSink`] that wraps another sink. Every event is
//! checked against the current document state before it is forwarded, so
//! the wrapped sink only ever sees well-formed documents (up to the first
//! error). Both decoders run their output through a `Rules`, and encoders
//! are wrapped in one by the convenience functions.
//!
//! The checks enforced here:
//! - `BeginDocument`, `Version(1)`, exactly one top-level value, `EndDocument`
//! - balanced containers, bounded by [`Limits::max_container_depth`]
//! - key/value alternation in maps, metadata and markup attributes, and the
//!   key types allowed there
//! - markup shape: name, attributes, then content
//! - comment containers hold only comment text and nested comments
//! - chunked arrays: chunk lengths, byte counts, UTF-8 and comment characters
//! - markers defined once, references resolved by the end of the document

pub mod markers;

use tracing::{debug, trace};

use crate::error::Error;
use crate::event::{ArrayType, ElementType, Event, EventSink, MarkerId};
use crate::limits::{FORMAT_VERSION, Limits, MAX_MARKER_INT_ID};
use crate::util::utf8::Utf8Validator;

use markers::{MarkerTable, ReferenceTarget};

/// Kind of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// The implicit top level of a document.
    Document,
    List,
    Map,
    /// Markup waiting for its name.
    MarkupName,
    MarkupAttributes,
    MarkupContent,
    Metadata,
    Comment,
}

impl ContainerKind {
    fn name(self) -> &'static str {
        match self {
            ContainerKind::Document => "document",
            ContainerKind::List => "list",
            ContainerKind::Map => "map",
            ContainerKind::MarkupName => "markup name",
            ContainerKind::MarkupAttributes => "markup attributes",
            ContainerKind::MarkupContent => "markup content",
            ContainerKind::Metadata => "metadata",
            ContainerKind::Comment => "comment",
        }
    }

    /// Containers whose objects alternate between keys and values.
    fn is_keyed(self) -> bool {
        matches!(
            self,
            ContainerKind::Map | ContainerKind::MarkupAttributes | ContainerKind::Metadata
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Header,
    Body,
    Ended,
}

/// How an object behaves in the context checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Object {
    Scalar { keyable: bool },
    String,
    Container,
    Markup,
}

impl Object {
    fn keyable(self) -> bool {
        match self {
            Object::Scalar { keyable } => keyable,
            Object::String => true,
            Object::Container | Object::Markup => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    kind: ContainerKind,
    /// Objects completed in this container (keys and values both count).
    objects: u64,
    /// Marker attached to this container, completed when it closes.
    marker: Option<MarkerId>,
    /// Marker waiting for the next object.
    pending_marker: Option<MarkerId>,
    /// Metadata waiting for the next object.
    pending_metadata: bool,
}

impl Frame {
    fn new(kind: ContainerKind, marker: Option<MarkerId>) -> Self {
        Self {
            kind,
            objects: 0,
            marker,
            pending_marker: None,
            pending_metadata: false,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenArray {
    array_type: ArrayType,
    marker: Option<MarkerId>,
    /// Bytes declared by all chunks so far.
    total: u64,
    /// Bytes of the current chunk not yet delivered.
    remaining: u64,
    is_final: bool,
    utf8: Utf8Validator,
}

/// Document structure validator wrapping the next event sink.
#[derive(Debug)]
pub struct Rules<S> {
    next: S,
    limits: Limits,
    phase: Phase,
    root: Frame,
    stack: Vec<Frame>,
    array: Option<OpenArray>,
    markers: MarkerTable,
}

impl<S: EventSink> Rules<S> {
    pub fn new(next: S, limits: Limits) -> Self {
        Self {
            next,
            limits,
            phase: Phase::Start,
            root: Frame::new(ContainerKind::Document, None),
            stack: Vec::new(),
            array: None,
            markers: MarkerTable::new(),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Number of open containers.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Kind of the innermost open container.
    pub fn container(&self) -> ContainerKind {
        self.stack.last().unwrap_or(&self.root).kind
    }

    /// Returns true once `EndDocument` has been accepted.
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Returns true while the document cannot end yet: a container or array
    /// is open, or the top-level value is still missing.
    pub fn needs_more(&self) -> bool {
        !self.stack.is_empty()
            || self.array.is_some()
            || self.root.objects == 0
            || self.root.pending_marker.is_some()
            || self.root.pending_metadata
    }

    pub fn inner(&self) -> &S {
        &self.next
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.next
    }

    pub fn into_inner(self) -> S {
        self.next
    }

    fn current(&mut self) -> &mut Frame {
        self.stack.last_mut().unwrap_or(&mut self.root)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn validate(&mut self, event: &Event) -> Result<(), Error> {
        match (self.phase, event) {
            (Phase::Start, Event::BeginDocument) => {
                debug!("document started");
                self.phase = Phase::Header;
                Ok(())
            }
            (Phase::Start, _) => Err(Error::UnexpectedEvent {
                event: event.name(),
                context: "before the beginning of the document",
            }),
            (Phase::Header, Event::Version(version)) => {
                if *version != FORMAT_VERSION {
                    return Err(Error::UnsupportedVersion { version: *version });
                }
                self.phase = Phase::Body;
                Ok(())
            }
            (Phase::Header, _) => Err(Error::UnexpectedEvent {
                event: event.name(),
                context: "before the version header",
            }),
            (Phase::Ended, _) => Err(Error::UnexpectedEvent {
                event: event.name(),
                context: "after the end of the document",
            }),
            (Phase::Body, _) => self.body_event(event),
        }
    }

    fn body_event(&mut self, event: &Event) -> Result<(), Error> {
        if self.array.is_some() {
            return match event {
                Event::ArrayChunk { length, is_final } => self.on_array_chunk(*length, *is_final),
                Event::ArrayData(data) => self.on_array_data(data),
                _ => Err(Error::UnexpectedEvent {
                    event: event.name(),
                    context: "inside an unfinished array",
                }),
            };
        }

        match event {
            Event::EndDocument => self.on_end_document(),
            Event::Padding(_) => Ok(()),

            Event::Nil => self.scalar(event.name(), Object::Scalar { keyable: false }),
            Event::Bool(_)
            | Event::Int(_)
            | Event::PositiveInt(_)
            | Event::BigInt(_)
            | Event::Float(_)
            | Event::BigFloat(_)
            | Event::DecimalFloat(_)
            | Event::Nan { .. }
            | Event::Uid(_)
            | Event::Time(_) => self.scalar(event.name(), Object::Scalar { keyable: true }),

            Event::String(s) => {
                self.check_text_length(s.len() as u64)?;
                self.scalar(event.name(), Object::String)
            }
            Event::ResourceId(s) | Event::CustomText(s) => {
                self.check_text_length(s.len() as u64)?;
                self.scalar(event.name(), Object::Scalar { keyable: true })
            }
            Event::CommentText(s) => self.on_comment_text(s),
            Event::Bytes(data) | Event::CustomBinary(data) => {
                self.check_array_size(data.len() as u64)?;
                self.scalar(event.name(), Object::Scalar { keyable: true })
            }
            Event::Array {
                element,
                length,
                data,
            } => {
                self.check_typed_array(*element, *length, data.len())?;
                self.scalar(event.name(), Object::Scalar { keyable: true })
            }

            Event::ListBegin => self.begin_container(event.name(), ContainerKind::List, Object::Container),
            Event::MapBegin => self.begin_container(event.name(), ContainerKind::Map, Object::Container),
            Event::MarkupBegin => {
                self.begin_container(event.name(), ContainerKind::MarkupName, Object::Markup)
            }
            Event::MetadataBegin => self.begin_metadata(),
            Event::CommentBegin => self.begin_comment(),
            Event::End => self.on_end(),

            Event::ArrayBegin(array_type) => self.on_array_begin(*array_type),
            Event::ArrayChunk { .. } | Event::ArrayData(_) => Err(Error::UnexpectedEvent {
                event: event.name(),
                context: "outside an array",
            }),

            Event::Marker(id) => self.on_marker(id),
            Event::Reference(id) => self.on_reference(id),

            Event::BeginDocument | Event::Version(_) => Err(Error::UnexpectedEvent {
                event: event.name(),
                context: "inside a document",
            }),
        }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Checks that an object may start here and takes its pending marker.
    fn begin_object(&mut self, event: &'static str, object: Object) -> Result<Option<MarkerId>, Error> {
        let frame = self.current();
        let context = match frame.kind {
            ContainerKind::Document if frame.objects > 0 => Some("after the top-level value"),
            ContainerKind::Comment => Some("inside a comment"),
            ContainerKind::MarkupName if object != Object::String => Some("as a markup name"),
            ContainerKind::MarkupContent if !matches!(object, Object::String | Object::Markup) => {
                Some("in markup content")
            }
            kind if kind.is_keyed() && frame.objects % 2 == 0 && !object.keyable() => {
                return Err(Error::InvalidMapKey { kind: event });
            }
            _ => None,
        };
        if let Some(context) = context {
            return Err(Error::UnexpectedEvent { event, context });
        }
        frame.pending_metadata = false;
        Ok(frame.pending_marker.take())
    }

    fn complete_object(&mut self) {
        let frame = self.current();
        frame.objects += 1;
        if frame.kind == ContainerKind::MarkupName {
            frame.kind = ContainerKind::MarkupAttributes;
            frame.objects = 0;
        }
    }

    fn scalar(&mut self, event: &'static str, object: Object) -> Result<(), Error> {
        if let Some(id) = self.begin_object(event, object)? {
            self.markers.open(&id, object.keyable());
            self.markers.complete(&id);
        }
        self.complete_object();
        Ok(())
    }

    fn check_text_length(&self, len: u64) -> Result<(), Error> {
        if len > self.limits.max_string_length {
            return Err(Error::LimitExceeded {
                limit: "string length",
                value: len,
                max: self.limits.max_string_length,
            });
        }
        self.check_array_size(len)
    }

    fn check_array_size(&self, len: u64) -> Result<(), Error> {
        if len > self.limits.max_array_size {
            return Err(Error::LimitExceeded {
                limit: "array size",
                value: len,
                max: self.limits.max_array_size,
            });
        }
        Ok(())
    }

    fn check_typed_array(&self, element: ElementType, length: u64, actual: usize) -> Result<(), Error> {
        let expected = element.byte_length(length).ok_or(Error::LimitExceeded {
            limit: "array size",
            value: u64::MAX,
            max: self.limits.max_array_size,
        })?;
        if expected != actual as u64 {
            return Err(Error::ArrayLengthMismatch {
                element: element.name(),
                length,
                expected,
                actual,
            });
        }
        self.check_array_size(expected)
    }

    // =========================================================================
    // Containers
    // =========================================================================

    fn check_depth(&self) -> Result<(), Error> {
        if self.stack.len() >= self.limits.max_container_depth {
            return Err(Error::LimitExceeded {
                limit: "container depth",
                value: self.stack.len() as u64 + 1,
                max: self.limits.max_container_depth as u64,
            });
        }
        Ok(())
    }

    fn begin_container(&mut self, event: &'static str, kind: ContainerKind, object: Object) -> Result<(), Error> {
        self.check_depth()?;
        let marker = self.begin_object(event, object)?;
        if let Some(id) = &marker {
            self.markers.open(id, false);
        }
        self.stack.push(Frame::new(kind, marker));
        Ok(())
    }

    fn begin_metadata(&mut self) -> Result<(), Error> {
        self.check_depth()?;
        let frame = self.current();
        let context = match frame.kind {
            ContainerKind::Document if frame.objects > 0 => Some("after the top-level value"),
            ContainerKind::Comment => Some("inside a comment"),
            ContainerKind::MarkupName => Some("as a markup name"),
            ContainerKind::MarkupContent => Some("in markup content"),
            _ if frame.pending_marker.is_some() => Some("after a marker"),
            _ => None,
        };
        if let Some(context) = context {
            return Err(Error::UnexpectedEvent {
                event: "metadata",
                context,
            });
        }
        self.stack.push(Frame::new(ContainerKind::Metadata, None));
        Ok(())
    }

    fn begin_comment(&mut self) -> Result<(), Error> {
        self.check_depth()?;
        let frame = self.current();
        let context = match frame.kind {
            ContainerKind::MarkupName => Some("before the markup name"),
            _ if frame.pending_marker.is_some() => Some("after a marker"),
            _ => None,
        };
        if let Some(context) = context {
            return Err(Error::UnexpectedEvent {
                event: "comment",
                context,
            });
        }
        self.stack.push(Frame::new(ContainerKind::Comment, None));
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), Error> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(Error::UnbalancedEnd);
        };
        let event = "end of container";
        if frame.pending_marker.is_some() {
            return Err(Error::UnexpectedEvent {
                event,
                context: "after a marker",
            });
        }
        if frame.pending_metadata {
            return Err(Error::UnexpectedEvent {
                event,
                context: "after metadata",
            });
        }
        match frame.kind {
            ContainerKind::MarkupName => {
                return Err(Error::UnexpectedEvent {
                    event,
                    context: "before the markup name",
                });
            }
            kind if kind.is_keyed() && frame.objects % 2 == 1 => {
                return Err(Error::MissingValue {
                    container: kind.name(),
                });
            }
            ContainerKind::MarkupAttributes => {
                frame.kind = ContainerKind::MarkupContent;
                frame.objects = 0;
                return Ok(());
            }
            _ => {}
        }

        let Some(frame) = self.stack.pop() else {
            return Err(Error::UnbalancedEnd);
        };
        if let Some(id) = &frame.marker {
            self.markers.complete(id);
        }
        match frame.kind {
            ContainerKind::Metadata => self.current().pending_metadata = true,
            ContainerKind::Comment => {}
            _ => self.complete_object(),
        }
        Ok(())
    }

    fn on_end_document(&mut self) -> Result<(), Error> {
        if !self.stack.is_empty() {
            return Err(Error::UnclosedContainers {
                depth: self.stack.len(),
            });
        }
        let event = "end document";
        if self.root.pending_marker.is_some() {
            return Err(Error::UnexpectedEvent {
                event,
                context: "after a marker",
            });
        }
        if self.root.pending_metadata {
            return Err(Error::UnexpectedEvent {
                event,
                context: "after metadata",
            });
        }
        if self.root.objects == 0 {
            return Err(Error::MissingTopLevelValue);
        }
        self.markers.check_resolved()?;
        self.markers.clear();
        self.phase = Phase::Ended;
        debug!("document complete");
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    fn on_comment_text(&mut self, text: &str) -> Result<(), Error> {
        if self.container() != ContainerKind::Comment {
            return Err(Error::UnexpectedEvent {
                event: "comment text",
                context: "outside a comment",
            });
        }
        self.check_text_length(text.len() as u64)?;
        text.chars().try_for_each(check_comment_char)
    }

    // =========================================================================
    // Markers and references
    // =========================================================================

    fn check_marker_id(&self, id: &MarkerId) -> Result<(), Error> {
        match id {
            MarkerId::Int(n) if *n > MAX_MARKER_INT_ID => Err(Error::LimitExceeded {
                limit: "marker id",
                value: *n,
                max: MAX_MARKER_INT_ID,
            }),
            MarkerId::Name(name) if name.len() > self.limits.max_marker_id_length => {
                Err(Error::LimitExceeded {
                    limit: "marker id length",
                    value: name.len() as u64,
                    max: self.limits.max_marker_id_length as u64,
                })
            }
            _ => Ok(()),
        }
    }

    fn on_marker(&mut self, id: &MarkerId) -> Result<(), Error> {
        self.check_marker_id(id)?;
        let frame = self.current();
        let context = match frame.kind {
            ContainerKind::Document if frame.objects > 0 => Some("after the top-level value"),
            ContainerKind::Comment => Some("inside a comment"),
            ContainerKind::MarkupName => Some("as a markup name"),
            _ if frame.pending_marker.is_some() => Some("after a marker"),
            _ => None,
        };
        if let Some(context) = context {
            return Err(Error::UnexpectedEvent {
                event: "marker",
                context,
            });
        }
        self.markers.define(id.clone())?;
        self.current().pending_marker = Some(id.clone());
        Ok(())
    }

    fn on_reference(&mut self, id: &MarkerId) -> Result<(), Error> {
        self.check_marker_id(id)?;
        if self.current().pending_marker.is_some() {
            return Err(Error::UnexpectedEvent {
                event: "reference",
                context: "after a marker",
            });
        }
        let keyable = matches!(
            self.markers.reference(id),
            ReferenceTarget::Defined { keyable: true }
        );
        self.begin_object("reference", Object::Scalar { keyable })?;
        self.complete_object();
        Ok(())
    }

    // =========================================================================
    // Chunked arrays
    // =========================================================================

    fn on_array_begin(&mut self, array_type: ArrayType) -> Result<(), Error> {
        let marker = if array_type == ArrayType::Comment {
            if self.container() != ContainerKind::Comment {
                return Err(Error::UnexpectedEvent {
                    event: "comment text",
                    context: "outside a comment",
                });
            }
            None
        } else {
            let object = if array_type == ArrayType::String {
                Object::String
            } else {
                Object::Scalar { keyable: true }
            };
            let marker = self.begin_object(array_type.name(), object)?;
            if let Some(id) = &marker {
                self.markers.open(id, object.keyable());
            }
            marker
        };
        self.array = Some(OpenArray {
            array_type,
            marker,
            total: 0,
            remaining: 0,
            is_final: false,
            utf8: Utf8Validator::new(),
        });
        Ok(())
    }

    fn on_array_chunk(&mut self, length: u64, is_final: bool) -> Result<(), Error> {
        let limits = self.limits;
        let Some(array) = self.array.as_mut() else {
            return Err(Error::UnexpectedEvent {
                event: "array chunk",
                context: "outside an array",
            });
        };
        if array.remaining > 0 {
            return Err(Error::ArrayChunkIncomplete {
                remaining: array.remaining,
            });
        }
        if array.array_type == ArrayType::Typed(ElementType::Bit) && !is_final && length % 8 != 0 {
            return Err(Error::MisalignedBitChunk { bits: length });
        }
        let total = array
            .array_type
            .byte_length(length)
            .and_then(|bytes| array.total.checked_add(bytes))
            .ok_or(Error::LimitExceeded {
                limit: "array size",
                value: u64::MAX,
                max: limits.max_array_size,
            })?;
        if array.array_type.is_text() && total > limits.max_string_length {
            return Err(Error::LimitExceeded {
                limit: "string length",
                value: total,
                max: limits.max_string_length,
            });
        }
        if total > limits.max_array_size {
            return Err(Error::LimitExceeded {
                limit: "array size",
                value: total,
                max: limits.max_array_size,
            });
        }
        array.remaining = total - array.total;
        array.total = total;
        array.is_final = is_final;
        self.finish_array_if_done()
    }

    fn on_array_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let Some(array) = self.array.as_mut() else {
            return Err(Error::UnexpectedEvent {
                event: "array data",
                context: "outside an array",
            });
        };
        if data.len() as u64 > array.remaining {
            return Err(Error::ArrayDataOverrun {
                len: data.len(),
                remaining: array.remaining,
            });
        }
        if array.array_type.is_text() {
            let comment = array.array_type == ArrayType::Comment;
            for &byte in data {
                if let Some(c) = array.utf8.feed(byte)? {
                    if comment {
                        check_comment_char(c)?;
                    }
                }
            }
        }
        array.remaining -= data.len() as u64;
        self.finish_array_if_done()
    }

    fn finish_array_if_done(&mut self) -> Result<(), Error> {
        let done = self
            .array
            .as_ref()
            .is_some_and(|array| array.is_final && array.remaining == 0);
        if !done {
            return Ok(());
        }
        let Some(array) = self.array.take() else {
            return Ok(());
        };
        array.utf8.finish()?;
        if array.array_type == ArrayType::Comment {
            return Ok(());
        }
        if let Some(id) = &array.marker {
            self.markers.complete(id);
        }
        self.complete_object();
        Ok(())
    }
}

/// Comment text may not contain control characters other than TAB and LF.
fn check_comment_char(c: char) -> Result<(), Error> {
    if c.is_control() && c != '\t' && c != '\n' {
        return Err(Error::InvalidCommentCharacter { character: c });
    }
    Ok(())
}

impl<S: EventSink> EventSink for Rules<S> {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        self.validate(&event)?;
        trace!(event = event.name(), depth = self.stack.len(), "accepted event");
        self.next.event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::document;

    fn run(events: &[Event]) -> Result<Vec<Event>, Error> {
        run_with_limits(events, Limits::default())
    }

    fn run_with_limits(events: &[Event], limits: Limits) -> Result<Vec<Event>, Error> {
        let mut rules = Rules::new(Vec::new(), limits);
        for event in events {
            rules.event(event.clone())?;
        }
        Ok(rules.into_inner())
    }

    fn s(text: &str) -> Event {
        Event::String(text.to_string())
    }

    #[test]
    fn test_forwards_valid_document() {
        let events = document([
            Event::MapBegin,
            s("a"),
            Event::PositiveInt(1),
            s("b"),
            Event::ListBegin,
            Event::Nil,
            Event::End,
            Event::End,
        ]);
        assert_eq!(run(&events).unwrap(), events);
    }

    #[test]
    fn test_header_rules() {
        assert!(matches!(
            run(&[Event::Nil]),
            Err(Error::UnexpectedEvent { .. })
        ));
        assert_eq!(
            run(&[Event::BeginDocument, Event::Version(2)]),
            Err(Error::UnsupportedVersion { version: 2 })
        );
        assert!(run(&[Event::BeginDocument, Event::Nil]).is_err());
    }

    #[test]
    fn test_single_top_level_value() {
        let events = document([Event::Nil, Event::Nil]);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "after the top-level value",
                ..
            })
        ));
        assert_eq!(run(&document([])), Err(Error::MissingTopLevelValue));
    }

    #[test]
    fn test_events_after_end_rejected() {
        let mut events = document([Event::Nil]);
        events.push(Event::Nil);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "after the end of the document",
                ..
            })
        ));
    }

    #[test]
    fn test_unbalanced_end() {
        assert_eq!(run(&document([Event::Nil, Event::End])), Err(Error::UnbalancedEnd));
        assert_eq!(
            run(&document([Event::ListBegin])),
            Err(Error::UnclosedContainers { depth: 1 })
        );
    }

    #[test]
    fn test_map_keys() {
        for key in [Event::Nil, Event::ListBegin, Event::MapBegin, Event::MarkupBegin] {
            let events = document([Event::MapBegin, key]);
            assert!(
                matches!(run(&events), Err(Error::InvalidMapKey { .. })),
                "accepted bad key"
            );
        }
        // Values may be anything
        let events = document([Event::MapBegin, s("k"), Event::Nil, Event::End]);
        assert!(run(&events).is_ok());
    }

    #[test]
    fn test_map_missing_value() {
        let events = document([Event::MapBegin, s("k"), Event::End]);
        assert_eq!(run(&events), Err(Error::MissingValue { container: "map" }));
    }

    #[test]
    fn test_depth_limit() {
        let limits = Limits::default().with_max_container_depth(3);
        let ok = document([
            Event::ListBegin,
            Event::ListBegin,
            Event::ListBegin,
            Event::End,
            Event::End,
            Event::End,
        ]);
        assert!(run_with_limits(&ok, limits).is_ok());

        let too_deep = document(vec![Event::ListBegin; 4]);
        assert!(matches!(
            run_with_limits(&too_deep, limits),
            Err(Error::LimitExceeded {
                limit: "container depth",
                value: 4,
                max: 3
            })
        ));
    }

    #[test]
    fn test_markup_shape() {
        let events = document([
            Event::MarkupBegin,
            s("div"),
            s("id"),
            s("main"),
            Event::End,
            s("text"),
            Event::MarkupBegin,
            s("br"),
            Event::End,
            Event::End,
            Event::CommentBegin,
            Event::CommentText("note".to_string()),
            Event::End,
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        // Name must be a string
        let events = document([Event::MarkupBegin, Event::PositiveInt(1)]);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "as a markup name",
                ..
            })
        ));

        // Content may not hold integers
        let events = document([
            Event::MarkupBegin,
            s("a"),
            Event::End,
            Event::PositiveInt(1),
        ]);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "in markup content",
                ..
            })
        ));

        // End before the name
        let events = document([Event::MarkupBegin, Event::End]);
        assert!(run(&events).is_err());
    }

    #[test]
    fn test_comments() {
        let events = document([
            Event::CommentBegin,
            Event::CommentText("a".to_string()),
            Event::CommentBegin,
            Event::End,
            Event::End,
            Event::PositiveInt(1),
            Event::CommentBegin,
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        let events = document([Event::CommentBegin, Event::PositiveInt(1)]);
        assert!(run(&events).is_err());

        let events = document([Event::ListBegin, Event::CommentText("x".to_string())]);
        assert!(run(&events).is_err());

        let events = document([Event::CommentBegin, Event::CommentText("a\rb".to_string())]);
        assert_eq!(
            run(&events),
            Err(Error::InvalidCommentCharacter { character: '\r' })
        );

        let events = document([
            Event::CommentBegin,
            Event::CommentText("tab\tand\nnewline".to_string()),
            Event::End,
            Event::Nil,
        ]);
        assert!(run(&events).is_ok());
    }

    #[test]
    fn test_metadata_prefix() {
        let events = document([
            Event::MetadataBegin,
            s("a"),
            Event::PositiveInt(1),
            Event::End,
            Event::ListBegin,
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        // Dangling metadata at the end of a list
        let events = document([
            Event::ListBegin,
            Event::MetadataBegin,
            Event::End,
            Event::End,
        ]);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "after metadata",
                ..
            })
        ));

        // Metadata does not take a map slot
        let events = document([
            Event::MapBegin,
            s("k"),
            Event::MetadataBegin,
            Event::End,
            s("v"),
            Event::End,
        ]);
        assert!(run(&events).is_ok());
    }

    #[test]
    fn test_markers_and_references() {
        let id = MarkerId::Int(1);
        let events = document([
            Event::Marker(id.clone()),
            Event::MapBegin,
            s("self"),
            Event::Reference(id.clone()),
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        let events = document([
            Event::ListBegin,
            Event::Marker(id.clone()),
            Event::Nil,
            Event::Marker(id.clone()),
            Event::Nil,
            Event::End,
        ]);
        assert!(matches!(run(&events), Err(Error::DuplicateMarker { .. })));

        let events = document([Event::ListBegin, Event::Reference(MarkerId::Int(9)), Event::End]);
        assert_eq!(
            run(&events),
            Err(Error::UnresolvedReference { id: "9".to_string() })
        );

        // Forward reference resolved later
        let events = document([
            Event::ListBegin,
            Event::Reference(id.clone()),
            Event::Marker(id.clone()),
            s("x"),
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        // A marker cannot dangle
        let events = document([Event::ListBegin, Event::Marker(id), Event::End]);
        assert!(run(&events).is_err());
    }

    #[test]
    fn test_reference_as_map_key() {
        let id = MarkerId::Name("k".to_string());
        let events = document([
            Event::ListBegin,
            Event::Marker(id.clone()),
            s("key"),
            Event::MapBegin,
            Event::Reference(id.clone()),
            Event::PositiveInt(1),
            Event::End,
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        // Marked list is not keyable
        let events = document([
            Event::ListBegin,
            Event::Marker(id.clone()),
            Event::ListBegin,
            Event::End,
            Event::MapBegin,
            Event::Reference(id.clone()),
        ]);
        assert!(matches!(run(&events), Err(Error::InvalidMapKey { .. })));

        // Forward reference is not keyable
        let events = document([Event::MapBegin, Event::Reference(id)]);
        assert!(matches!(run(&events), Err(Error::InvalidMapKey { .. })));
    }

    #[test]
    fn test_marker_id_length() {
        let limits = Limits::default().with_max_marker_id_length(3);
        let events = document([
            Event::Marker(MarkerId::Name("long".to_string())),
            Event::Nil,
        ]);
        assert!(matches!(
            run_with_limits(&events, limits),
            Err(Error::LimitExceeded {
                limit: "marker id length",
                ..
            })
        ));
    }

    #[test]
    fn test_marker_id_range() {
        let top = MarkerId::Int(MAX_MARKER_INT_ID);
        let events = document([
            Event::ListBegin,
            Event::Marker(top.clone()),
            Event::Nil,
            Event::Reference(top),
            Event::End,
        ]);
        assert!(run(&events).is_ok());

        let too_big = MarkerId::Int(MAX_MARKER_INT_ID + 1);
        for event in [Event::Marker(too_big.clone()), Event::Reference(too_big)] {
            let events = document([Event::ListBegin, event, Event::Nil, Event::End]);
            assert!(matches!(
                run(&events),
                Err(Error::LimitExceeded {
                    limit: "marker id",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_chunked_array() {
        let events = document([
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk {
                length: 3,
                is_final: false,
            },
            Event::ArrayData(b"ab".to_vec()),
            Event::ArrayData(b"c".to_vec()),
            Event::ArrayChunk {
                length: 0,
                is_final: false,
            },
            Event::ArrayChunk {
                length: 2,
                is_final: true,
            },
            Event::ArrayData(b"de".to_vec()),
        ]);
        assert!(run(&events).is_ok());
    }

    #[test]
    fn test_array_data_overrun() {
        let events = document([
            Event::ArrayBegin(ArrayType::Typed(ElementType::U8)),
            Event::ArrayChunk {
                length: 1,
                is_final: true,
            },
            Event::ArrayData(vec![1, 2]),
        ]);
        assert_eq!(
            run(&events),
            Err(Error::ArrayDataOverrun {
                len: 2,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_array_chunk_before_data_consumed() {
        let events = document([
            Event::ArrayBegin(ArrayType::CustomBinary),
            Event::ArrayChunk {
                length: 2,
                is_final: false,
            },
            Event::ArrayChunk {
                length: 2,
                is_final: true,
            },
        ]);
        assert_eq!(
            run(&events),
            Err(Error::ArrayChunkIncomplete { remaining: 2 })
        );
    }

    #[test]
    fn test_array_interrupted() {
        let events = document([
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk {
                length: 2,
                is_final: true,
            },
            Event::ArrayData(b"a".to_vec()),
            Event::Nil,
        ]);
        assert!(matches!(
            run(&events),
            Err(Error::UnexpectedEvent {
                context: "inside an unfinished array",
                ..
            })
        ));
    }

    #[test]
    fn test_bit_chunks_byte_aligned() {
        let bits = ArrayType::Typed(ElementType::Bit);
        let events = document([
            Event::ArrayBegin(bits),
            Event::ArrayChunk {
                length: 5,
                is_final: false,
            },
        ]);
        assert_eq!(run(&events), Err(Error::MisalignedBitChunk { bits: 5 }));

        let events = document([
            Event::ArrayBegin(bits),
            Event::ArrayChunk {
                length: 8,
                is_final: false,
            },
            Event::ArrayData(vec![0xFF]),
            Event::ArrayChunk {
                length: 3,
                is_final: true,
            },
            Event::ArrayData(vec![0x05]),
        ]);
        assert!(run(&events).is_ok());
    }

    #[test]
    fn test_utf8_across_chunks() {
        let bytes = "\u{e9}".as_bytes();
        let events = document([
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk {
                length: 1,
                is_final: false,
            },
            Event::ArrayData(vec![bytes[0]]),
            Event::ArrayChunk {
                length: 1,
                is_final: true,
            },
            Event::ArrayData(vec![bytes[1]]),
        ]);
        assert!(run(&events).is_ok());

        let events = document([
            Event::ArrayBegin(ArrayType::String),
            Event::ArrayChunk {
                length: 1,
                is_final: true,
            },
            Event::ArrayData(vec![bytes[0]]),
        ]);
        assert!(matches!(run(&events), Err(Error::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_string_limit() {
        let limits = Limits::default().with_max_string_length(4);
        assert!(run_with_limits(&document([s("four")]), limits).is_ok());
        assert!(matches!(
            run_with_limits(&document([s("fiver")]), limits),
            Err(Error::LimitExceeded {
                limit: "string length",
                ..
            })
        ));
    }

    #[test]
    fn test_typed_array_length_checked() {
        let events = document([Event::Array {
            element: ElementType::U16,
            length: 2,
            data: vec![1, 0, 2],
        }]);
        assert!(matches!(
            run(&events),
            Err(Error::ArrayLengthMismatch { expected: 4, .. })
        ));
    }
}
