//! Hybrid posting list of logical positions
//!
//! Positions live in one of two parts:
//! - explicit: individual positions in a hash set (O(1) membership)
//! - ranges: sorted, disjoint `{start, count}` runs of consecutive positions
//!
//! A run moves into the range part only once it reaches the range
//! threshold. Compaction is triggered lazily when the explicit part grows
//! to `range_threshold * compaction_factor` entries.

use std::collections::hash_set;
use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::storage::Position;

/// Tuning knobs for posting lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Minimum run length stored as a range
    pub range_threshold: u64,
    /// Range count at which `contains` switches from linear to binary search
    pub binary_search_threshold: usize,
    /// Explicit-part size that triggers compaction, as a multiple of `range_threshold`
    pub compaction_factor: u64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            range_threshold: 10,
            binary_search_threshold: 32,
            compaction_factor: 3,
        }
    }
}

impl PostingConfig {
    /// Explicit-part size that triggers compaction
    pub fn compaction_trigger(&self) -> usize {
        (self.range_threshold * self.compaction_factor) as usize
    }
}

/// A run of consecutive positions `[start, start + count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionRange {
    /// First position in the run
    pub start: Position,
    /// Number of positions in the run
    pub count: u64,
}

impl PositionRange {
    /// Creates a range
    pub fn new(start: Position, count: u64) -> Self {
        Self { start, count }
    }

    /// One past the last position
    pub fn end(&self) -> Position {
        self.start + self.count
    }

    /// Returns true if the position falls inside the run
    pub fn contains(&self, position: Position) -> bool {
        position >= self.start && position < self.end()
    }
}

/// Persisted range, written as `[start, count]`.
///
/// Object form `{"start": s, "count": c}` is accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedRange {
    Pair(Position, u64),
    Object { start: Position, count: u64 },
}

impl PersistedRange {
    fn into_range(self) -> PositionRange {
        match self {
            PersistedRange::Pair(start, count) => PositionRange::new(start, count),
            PersistedRange::Object { start, count } => PositionRange::new(start, count),
        }
    }
}

/// Persisted posting list.
///
/// Written as `[explicitPositions, [[start, count], ...]]`. A bare array of
/// positions is the legacy explicit-only format and is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedPostings {
    Hybrid(Vec<Position>, Vec<PersistedRange>),
    Legacy(Vec<Position>),
}

impl PersistedPostings {
    /// The empty list, `[[], []]`
    pub fn empty() -> Self {
        PersistedPostings::Hybrid(Vec::new(), Vec::new())
    }
}

/// Mutable set of logical positions for one (field, value-key) pair.
#[derive(Debug, Clone)]
pub struct PostingList {
    explicit: HashSet<Position>,
    ranges: Vec<PositionRange>,
    config: PostingConfig,
    /// Explicit-part size at which the next compaction runs
    compact_at: usize,
}

impl Default for PostingList {
    fn default() -> Self {
        Self::new(PostingConfig::default())
    }
}

impl PostingList {
    /// Creates an empty posting list
    pub fn new(config: PostingConfig) -> Self {
        Self {
            explicit: HashSet::new(),
            ranges: Vec::new(),
            config,
            compact_at: config.compaction_trigger(),
        }
    }

    /// Adds a position. Returns false if it was already present.
    pub fn add(&mut self, position: Position) -> bool {
        if self.contains(position) {
            return false;
        }
        self.explicit.insert(position);
        if self.explicit.len() >= self.compact_at {
            self.compact();
        }
        true
    }

    /// Removes a position. Returns false if it was not present.
    pub fn remove(&mut self, position: Position) -> bool {
        if self.explicit.remove(&position) {
            self.relax_backoff();
            return true;
        }

        let Some(idx) = self.find_range(position) else {
            return false;
        };

        let range = self.ranges.remove(idx);
        let left = PositionRange::new(range.start, position - range.start);
        let right = PositionRange::new(position + 1, range.end() - position - 1);

        let mut insert_at = idx;
        for piece in [left, right] {
            if piece.count == 0 {
                continue;
            }
            if piece.count >= self.config.range_threshold {
                self.ranges.insert(insert_at, piece);
                insert_at += 1;
            } else {
                self.explicit.extend(piece.start..piece.end());
            }
        }
        true
    }

    /// Returns true if the position is in the list
    pub fn contains(&self, position: Position) -> bool {
        self.explicit.contains(&position) || self.find_range(position).is_some()
    }

    /// Total number of positions
    pub fn len(&self) -> u64 {
        self.explicit.len() as u64 + self.ranges.iter().map(|r| r.count).sum::<u64>()
    }

    /// Returns true if both parts are empty
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.ranges.is_empty()
    }

    /// Lazy iterator over every position.
    ///
    /// Range positions come first in ascending order, explicit positions
    /// follow in unspecified order. Call again to restart.
    pub fn iter(&self) -> Positions<'_> {
        Positions {
            ranges: self.ranges.iter(),
            current: 0..0,
            explicit: self.explicit.iter(),
        }
    }

    /// All positions in ascending order
    pub fn to_sorted_vec(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.iter().collect();
        positions.sort_unstable();
        positions
    }

    /// Number of positions held individually
    pub fn explicit_len(&self) -> usize {
        self.explicit.len()
    }

    /// The range part, sorted by start
    pub fn ranges(&self) -> &[PositionRange] {
        &self.ranges
    }

    /// Configuration this list was built with
    pub fn config(&self) -> &PostingConfig {
        &self.config
    }

    /// Promotes every explicit run of at least `range_threshold`
    /// consecutive positions into the range part.
    pub fn compact(&mut self) {
        let mut values: Vec<Position> = self.explicit.iter().copied().collect();
        values.sort_unstable();

        let threshold = self.config.range_threshold;
        let mut promoted = Vec::new();
        let mut i = 0;
        while i < values.len() {
            let mut j = i + 1;
            while j < values.len() && values[j] == values[j - 1] + 1 {
                j += 1;
            }
            let run = (j - i) as u64;
            if run >= threshold {
                promoted.push(PositionRange::new(values[i], run));
                for v in &values[i..j] {
                    self.explicit.remove(v);
                }
            }
            i = j;
        }

        if !promoted.is_empty() {
            trace!(
                promoted = promoted.len(),
                explicit_left = self.explicit.len(),
                "posting list compacted"
            );
            self.ranges.extend(promoted);
            self.normalize_ranges();
        }

        // Values left explicit did not form runs; wait for another full
        // trigger's worth of adds before scanning them again.
        let trigger = self.config.compaction_trigger();
        self.compact_at = trigger.max(self.explicit.len() + trigger);
    }

    /// Keeps the compaction point within one trigger of the explicit size
    fn relax_backoff(&mut self) {
        let trigger = self.config.compaction_trigger();
        self.compact_at = self.compact_at.min(self.explicit.len() + trigger);
    }

    /// Sorts ranges and merges touching runs
    fn normalize_ranges(&mut self) {
        self.ranges.sort_unstable_by_key(|r| r.start);
        let mut merged: Vec<PositionRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start <= last.end() => {
                    let end = last.end().max(range.end());
                    last.count = end - last.start;
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }

    /// Index of the range containing `position`
    fn find_range(&self, position: Position) -> Option<usize> {
        if self.ranges.len() < self.config.binary_search_threshold {
            return self.ranges.iter().position(|r| r.contains(position));
        }

        let idx = self.ranges.partition_point(|r| r.start <= position);
        if idx == 0 {
            return None;
        }
        self.ranges[idx - 1].contains(position).then_some(idx - 1)
    }

    /// Persisted `(explicit, ranges)` pair with explicit positions sorted
    pub fn to_persisted(&self) -> PersistedPostings {
        let mut explicit: Vec<Position> = self.explicit.iter().copied().collect();
        explicit.sort_unstable();
        let ranges = self
            .ranges
            .iter()
            .map(|r| PersistedRange::Pair(r.start, r.count))
            .collect();
        PersistedPostings::Hybrid(explicit, ranges)
    }

    /// Rebuilds a list from its persisted form.
    ///
    /// Empty ranges are dropped, touching ranges merged, and explicit
    /// positions already covered by a range are discarded.
    pub fn from_persisted(persisted: PersistedPostings, config: PostingConfig) -> Self {
        let mut list = Self::new(config);
        let (explicit, ranges) = match persisted {
            PersistedPostings::Hybrid(explicit, ranges) => (explicit, ranges),
            PersistedPostings::Legacy(explicit) => (explicit, Vec::new()),
        };

        list.ranges = ranges
            .into_iter()
            .map(PersistedRange::into_range)
            .filter(|r| r.count > 0)
            .collect();
        list.normalize_ranges();

        for position in explicit {
            if list.find_range(position).is_none() {
                list.explicit.insert(position);
            }
        }
        let trigger = config.compaction_trigger();
        list.compact_at = trigger.max(list.explicit.len() + 1);
        list
    }

    /// Returns true if both lists hold exactly the same positions
    pub fn same_positions(&self, other: &PostingList) -> bool {
        self.len() == other.len() && self.iter().all(|p| other.contains(p))
    }
}

/// Lazy iterator over a posting list
#[derive(Debug, Clone)]
pub struct Positions<'a> {
    ranges: std::slice::Iter<'a, PositionRange>,
    current: Range<Position>,
    explicit: hash_set::Iter<'a, Position>,
}

impl Iterator for Positions<'_> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if let Some(p) = self.current.next() {
            return Some(p);
        }
        for range in self.ranges.by_ref() {
            self.current = range.start..range.end();
            if let Some(p) = self.current.next() {
                return Some(p);
            }
        }
        self.explicit.next().copied()
    }
}
