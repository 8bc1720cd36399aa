//! Vector-backed record source
//!
//! Slot index is the logical position. Deleted slots keep their position
//! and hold no record until the next generation.

use std::borrow::Cow;

use serde_json::Value;
use tracing::warn;

use crate::index::FieldIndex;

use super::{Position, RecordResolver, RecordSource, RecordStream};

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryRecords {
    slots: Vec<Option<Value>>,
}

impl MemoryRecords {
    /// Creates an empty store
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Creates a store holding `records` at positions `0..records.len()`
    pub fn from_records(records: impl IntoIterator<Item = Value>) -> Self {
        Self {
            slots: records.into_iter().map(Some).collect(),
        }
    }

    /// Appends a record and returns its position
    pub fn push(&mut self, record: Value) -> Position {
        self.slots.push(Some(record));
        (self.slots.len() - 1) as Position
    }

    /// Appends an empty slot (e.g. a blank line) and returns its position
    pub fn push_empty(&mut self) -> Position {
        self.slots.push(None);
        (self.slots.len() - 1) as Position
    }

    /// Replaces the record at `position`, returning the previous one
    pub fn replace(&mut self, position: Position, record: Value) -> Option<Value> {
        self.slots
            .get_mut(position as usize)
            .and_then(|slot| slot.replace(record))
    }

    /// Empties the slot at `position`, returning its record
    pub fn delete(&mut self, position: Position) -> Option<Value> {
        self.slots.get_mut(position as usize).and_then(Option::take)
    }

    /// Borrowed access to a slot
    pub fn get(&self, position: Position) -> Option<&Value> {
        self.slots.get(position as usize).and_then(Option::as_ref)
    }

    /// Number of live records
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Drops empty slots and renumbers positions, starting a new generation.
    ///
    /// Any index built against the old positions must be rebuilt.
    pub fn compact(&mut self) {
        self.slots.retain(Option::is_some);
    }
}

impl RecordResolver for MemoryRecords {
    fn record_at(&self, position: Position) -> Option<Cow<'_, Value>> {
        self.get(position).map(Cow::Borrowed)
    }
}

impl RecordSource for MemoryRecords {
    fn total_positions(&self) -> Position {
        self.slots.len() as Position
    }

    fn records(&self) -> RecordStream<'_> {
        Box::new(
            self.slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|r| (i as Position, Cow::Borrowed(r)))),
        )
    }

    fn rebuild_index(&self, index: &mut FieldIndex) -> bool {
        match index.rebuild(self.records()) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "index rebuild from memory records failed");
                false
            }
        }
    }
}
