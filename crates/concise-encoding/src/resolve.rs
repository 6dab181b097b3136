//! Marker and reference resolution.
//!
//! [`DocumentBuilder`] turns an event stream into an arena of [`Node`]s.
//! References become edges to the marked node, so shared and cyclic
//! structures are represented without duplication. [`Document::to_events`]
//! goes the other way and re-introduces markers for every node that is
//! referenced.
//!
//! Comments and padding are dropped. Metadata is built into the arena but
//! kept out of the tree, so values marked inside it can still be referenced;
//! [`Document::to_events`] writes such a target in place of its first
//! reference.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::Error;
use crate::event::{ArrayType, Event, EventSink, MarkerId, document, replay};
use crate::limits::Limits;
use crate::rules::Rules;

/// Index of a node in a [`Document`].
pub type NodeId = usize;

/// A value in a resolved document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Any non-container value, as its complete event.
    Scalar(Event),
    List(Vec<NodeId>),
    Map(Vec<(NodeId, NodeId)>),
    Markup {
        name: String,
        attributes: Vec<(NodeId, NodeId)>,
        content: Vec<NodeId>,
    },
    /// Edge to a marked node.
    Reference(NodeId),
}

/// Arena of nodes with a single root.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Builds a document from a complete event stream, validating it first.
    pub fn from_events(events: &[Event]) -> Result<Self, Error> {
        let mut rules = Rules::new(DocumentBuilder::new(), Limits::default());
        replay(events, &mut rules)?;
        rules.into_inner().into_document()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Follows a reference to the node it points at.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        match self.nodes.get(id) {
            Some(Node::Reference(target)) => *target,
            _ => id,
        }
    }

    /// Looks up a string key in a map node, returning the resolved value.
    pub fn map_get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        let Some(Node::Map(pairs)) = self.nodes.get(self.resolve(map)) else {
            return None;
        };
        pairs.iter().find_map(|&(k, v)| match self.nodes.get(self.resolve(k)) {
            Some(Node::Scalar(Event::String(s))) if s == key => Some(self.resolve(v)),
            _ => None,
        })
    }

    /// Serializes the document as a complete event stream.
    ///
    /// Every referenced node gets an integer marker, numbered from 1 in
    /// node order. Each node is emitted once, so cycles terminate.
    pub fn to_events(&self) -> Vec<Event> {
        let attached = self.attached();
        let mut inlined = FxHashSet::default();
        let mut targets: Vec<NodeId> = self
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Reference(target) => Some(*target),
                _ => None,
            })
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        targets.sort_unstable();
        let ids: FxHashMap<NodeId, u64> = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| (target, i as u64 + 1))
            .collect();

        enum Work {
            Node(NodeId),
            End,
        }

        let mut body = Vec::new();
        let mut work = vec![Work::Node(self.root)];
        while let Some(item) = work.pop() {
            let id = match item {
                Work::End => {
                    body.push(Event::End);
                    continue;
                }
                Work::Node(id) => id,
            };
            if let Some(marker) = ids.get(&id) {
                body.push(Event::Marker(MarkerId::Int(*marker)));
            }
            match &self.nodes[id] {
                Node::Scalar(event) => body.push(event.clone()),
                // Targets outside the tree are written at their first reference
                Node::Reference(target) if !attached.contains(target) && inlined.insert(*target) => {
                    work.push(Work::Node(*target));
                }
                Node::Reference(target) => {
                    let marker = ids.get(target).copied().unwrap_or_default();
                    body.push(Event::Reference(MarkerId::Int(marker)));
                }
                Node::List(items) => {
                    body.push(Event::ListBegin);
                    work.push(Work::End);
                    work.extend(items.iter().rev().map(|&item| Work::Node(item)));
                }
                Node::Map(pairs) => {
                    body.push(Event::MapBegin);
                    work.push(Work::End);
                    for &(k, v) in pairs.iter().rev() {
                        work.push(Work::Node(v));
                        work.push(Work::Node(k));
                    }
                }
                Node::Markup {
                    name,
                    attributes,
                    content,
                } => {
                    body.push(Event::MarkupBegin);
                    body.push(Event::String(name.clone()));
                    work.push(Work::End);
                    work.extend(content.iter().rev().map(|&item| Work::Node(item)));
                    work.push(Work::End);
                    for &(k, v) in attributes.iter().rev() {
                        work.push(Work::Node(v));
                        work.push(Work::Node(k));
                    }
                }
            }
        }
        document(body)
    }

    /// Nodes reachable from the root without following references.
    fn attached(&self) -> FxHashSet<NodeId> {
        let mut seen = FxHashSet::default();
        let mut work = vec![self.root];
        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            match &self.nodes[id] {
                Node::List(items) => work.extend(items),
                Node::Map(pairs) => work.extend(pairs.iter().flat_map(|&(k, v)| [k, v])),
                Node::Markup {
                    attributes, content, ..
                } => {
                    work.extend(attributes.iter().flat_map(|&(k, v)| [k, v]));
                    work.extend(content);
                }
                Node::Scalar(_) | Node::Reference(_) => {}
            }
        }
        seen
    }
}

// =============================================================================
// BUILDER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Items,
    Pairs,
    MarkupName,
    MarkupAttributes,
    MarkupContent,
}

#[derive(Debug, Clone)]
struct Open {
    id: NodeId,
    slot: Slot,
    key: Option<NodeId>,
}

#[derive(Debug, Clone)]
struct PendingArray {
    array_type: ArrayType,
    length: u64,
    remaining: u64,
    is_final: bool,
    data: Vec<u8>,
}

/// Event sink that builds a [`Document`].
///
/// Expects a well-formed stream; run it behind a [`Rules`] engine when the
/// input is untrusted.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    stack: Vec<Open>,
    /// Open comment containers being skipped, counted in ends.
    skip: usize,
    pending_marker: Option<MarkerId>,
    markers: FxHashMap<MarkerId, NodeId>,
    /// References seen before their marker.
    forward: Vec<(NodeId, MarkerId)>,
    array: Option<PendingArray>,
    ended: bool,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built document once `EndDocument` has been seen.
    pub fn into_document(self) -> Result<Document, Error> {
        if !self.ended {
            return Err(Error::UnexpectedEof { context: "document" });
        }
        let root = self.root.ok_or(Error::MissingTopLevelValue)?;
        Ok(Document {
            nodes: self.nodes,
            root,
        })
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Adds a node to the innermost open container.
    fn attach(&mut self, id: NodeId) {
        if let Some(marker) = self.pending_marker.take() {
            self.markers.insert(marker, id);
        }
        let Some(open) = self.stack.last_mut() else {
            self.root.get_or_insert(id);
            return;
        };
        let pair = match open.slot {
            Slot::Pairs | Slot::MarkupAttributes => match open.key.take() {
                None => {
                    open.key = Some(id);
                    return;
                }
                Some(key) => Some((key, id)),
            },
            _ => None,
        };
        match (&mut self.nodes[open.id], pair) {
            (Node::List(items), _) => items.push(id),
            (Node::Map(pairs), Some(pair)) => pairs.push(pair),
            (Node::Markup { attributes, .. }, Some(pair)) => attributes.push(pair),
            (Node::Markup { content, .. }, None) => content.push(id),
            _ => {}
        }
    }

    fn scalar(&mut self, event: Event) {
        if let (Event::String(name), Some(open)) = (&event, self.stack.last_mut()) {
            if open.slot == Slot::MarkupName {
                open.slot = Slot::MarkupAttributes;
                if let Node::Markup { name: slot, .. } = &mut self.nodes[open.id] {
                    *slot = name.clone();
                }
                return;
            }
        }
        let id = self.alloc(Node::Scalar(event));
        self.attach(id);
    }

    fn begin(&mut self, node: Node, slot: Slot) {
        let id = self.alloc(node);
        self.attach(id);
        self.stack.push(Open { id, slot, key: None });
    }

    /// Opens metadata as a map that is not attached to its parent.
    fn begin_metadata(&mut self) {
        let id = self.alloc(Node::Map(Vec::new()));
        self.stack.push(Open {
            id,
            slot: Slot::Pairs,
            key: None,
        });
    }

    fn end(&mut self) {
        if let Some(open) = self.stack.last_mut() {
            if open.slot == Slot::MarkupAttributes {
                open.slot = Slot::MarkupContent;
                return;
            }
        }
        self.stack.pop();
    }

    fn reference(&mut self, id: &MarkerId) {
        match self.markers.get(id).copied() {
            Some(target) => {
                let node = self.alloc(Node::Reference(target));
                self.attach(node);
            }
            None => {
                let node = self.alloc(Node::Reference(NodeId::MAX));
                self.forward.push((node, id.clone()));
                self.attach(node);
            }
        }
    }

    fn end_document(&mut self) -> Result<(), Error> {
        for (node, id) in std::mem::take(&mut self.forward) {
            let target = *self
                .markers
                .get(&id)
                .ok_or_else(|| Error::UnresolvedReference { id: id.to_string() })?;
            self.nodes[node] = Node::Reference(target);
        }
        self.ended = true;
        debug!(nodes = self.nodes.len(), markers = self.markers.len(), "document resolved");
        Ok(())
    }

    /// Counts nested comments opened and closed while skipping.
    fn skip_event(&mut self, event: &Event) {
        match event {
            Event::CommentBegin => self.skip += 1,
            Event::End => self.skip -= 1,
            _ => {}
        }
    }

    fn array_event(&mut self, event: Event) -> Result<(), Error> {
        match event {
            Event::ArrayBegin(array_type) => {
                self.array = Some(PendingArray {
                    array_type,
                    length: 0,
                    remaining: 0,
                    is_final: false,
                    data: Vec::new(),
                });
            }
            Event::ArrayChunk { length, is_final } => {
                if let Some(array) = self.array.as_mut() {
                    array.length += length;
                    array.remaining = array.array_type.byte_length(length).unwrap_or(0);
                    array.is_final = is_final;
                }
            }
            Event::ArrayData(data) => {
                if let Some(array) = self.array.as_mut() {
                    array.remaining = array.remaining.saturating_sub(data.len() as u64);
                    array.data.extend_from_slice(&data);
                }
            }
            _ => {}
        }
        let done = self
            .array
            .as_ref()
            .is_some_and(|array| array.is_final && array.remaining == 0);
        if done {
            if let Some(array) = self.array.take() {
                self.scalar(Event::from_array(array.array_type, array.length, array.data)?);
            }
        }
        Ok(())
    }
}

impl EventSink for DocumentBuilder {
    fn event(&mut self, event: Event) -> Result<(), Error> {
        if self.skip > 0 {
            self.skip_event(&event);
            return Ok(());
        }
        match event {
            Event::BeginDocument | Event::Version(_) | Event::Padding(_) => {}
            Event::EndDocument => self.end_document()?,
            Event::CommentBegin => self.skip = 1,
            Event::MetadataBegin => self.begin_metadata(),
            Event::ListBegin => self.begin(Node::List(Vec::new()), Slot::Items),
            Event::MapBegin => self.begin(Node::Map(Vec::new()), Slot::Pairs),
            Event::MarkupBegin => self.begin(
                Node::Markup {
                    name: String::new(),
                    attributes: Vec::new(),
                    content: Vec::new(),
                },
                Slot::MarkupName,
            ),
            Event::End => self.end(),
            Event::Marker(id) => self.pending_marker = Some(id),
            Event::Reference(id) => self.reference(&id),
            Event::ArrayBegin(_) | Event::ArrayChunk { .. } | Event::ArrayData(_) => self.array_event(event)?,
            scalar => self.scalar(scalar),
        }
        Ok(())
    }
}
