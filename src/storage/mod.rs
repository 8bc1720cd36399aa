//! Storage collaborator contract
//!
//! The indexing core never performs I/O. Everything it needs from the
//! record store goes through the traits below:
//!
//! - `RecordResolver::record_at` - disambiguates shared value-keys on remove
//! - `RecordSource::total_positions` - universe for complements
//! - `RecordSource::records` - full stream for the Streaming strategy
//! - `RecordSource::rebuild_index` - optional rebuild hook for the planner
//!
//! Logical positions are opaque, monotonically increasing integers that stay
//! stable until the next generation change (compaction / full rebuild).

mod memory;

use std::borrow::Cow;

use serde_json::Value;

use crate::index::FieldIndex;

pub use memory::MemoryRecords;

/// Logical position of a record
pub type Position = u64;

/// Boxed record stream yielding `(position, record)` in ascending position order
pub type RecordStream<'a> = Box<dyn Iterator<Item = (Position, Cow<'a, Value>)> + 'a>;

/// Resolves the record stored at a logical position
pub trait RecordResolver {
    /// Returns the record at `position`, or None if the slot holds nothing
    fn record_at(&self, position: Position) -> Option<Cow<'_, Value>>;
}

/// Full read access needed by the query planner
pub trait RecordSource: RecordResolver {
    /// Number of logical positions in the current generation
    fn total_positions(&self) -> Position;

    /// Streams every live record in ascending position order
    fn records(&self) -> RecordStream<'_>;

    /// Rebuilds `index` from the records of this source.
    ///
    /// Returns false if the source cannot rebuild. The planner calls this
    /// at most once per query.
    fn rebuild_index(&self, index: &mut FieldIndex) -> bool {
        let _ = index;
        false
    }
}
