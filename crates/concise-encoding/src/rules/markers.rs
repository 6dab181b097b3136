//! Marker table: tracks marker definitions and references within a document.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Error;
use crate::event::MarkerId;

/// State of a defined marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// The marker was seen but its object has not started yet.
    Pending,
    /// The marked object is open (a container still being built).
    Open { keyable: bool },
    /// The marked object is complete.
    Complete { keyable: bool },
}

/// What a reference points at when it is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// The marker is defined; `keyable` is true only for complete keyable objects.
    Defined { keyable: bool },
    /// The marker is not defined yet and must be by the end of the document.
    Forward,
}

/// Write-once table of marker identifiers.
#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    entries: FxHashMap<MarkerId, MarkerState>,
    forward: FxHashSet<MarkerId>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a marker. Each id may be defined once per document.
    pub fn define(&mut self, id: MarkerId) -> Result<(), Error> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateMarker { id: id.to_string() });
        }
        self.entries.insert(id, MarkerState::Pending);
        Ok(())
    }

    /// Records that the marked object has started.
    pub fn open(&mut self, id: &MarkerId, keyable: bool) {
        if let Some(state) = self.entries.get_mut(id) {
            *state = MarkerState::Open { keyable };
        }
    }

    /// Records that the marked object is complete.
    pub fn complete(&mut self, id: &MarkerId) {
        if let Some(state) = self.entries.get_mut(id) {
            let keyable = matches!(state, MarkerState::Open { keyable: true });
            *state = MarkerState::Complete { keyable };
        }
    }

    pub fn get(&self, id: &MarkerId) -> Option<MarkerState> {
        self.entries.get(id).copied()
    }

    /// Looks up a reference, remembering ids that are not defined yet.
    pub fn reference(&mut self, id: &MarkerId) -> ReferenceTarget {
        match self.entries.get(id) {
            Some(MarkerState::Complete { keyable }) => ReferenceTarget::Defined { keyable: *keyable },
            Some(_) => ReferenceTarget::Defined { keyable: false },
            None => {
                self.forward.insert(id.clone());
                ReferenceTarget::Forward
            }
        }
    }

    /// Fails with the first forward reference that was never defined.
    pub fn check_resolved(&self) -> Result<(), Error> {
        let mut missing: Vec<&MarkerId> = self
            .forward
            .iter()
            .filter(|id| !self.entries.contains_key(*id))
            .collect();
        missing.sort();
        match missing.first() {
            Some(id) => Err(Error::UnresolvedReference { id: id.to_string() }),
            None => Ok(()),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.forward.clear();
    }
}
