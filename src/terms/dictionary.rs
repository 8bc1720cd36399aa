//! Reference-counted string interner
//!
//! Write path: `get_or_create_id`, `bulk_get_or_create`.
//! Read path: `peek_id`, `term`.
//! Maintenance: `release`, `cleanup_orphans`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Interned term identifier
pub type TermId = u64;

/// Persisted dictionary shape: `{id: term}`
pub type PersistedTerms = BTreeMap<TermId, String>;

/// Policy controlling when non-forced orphan cleanup runs.
///
/// Cleanup only runs when the orphan count reaches `min_orphan_count`
/// and the orphans make up more than `orphan_ratio` of all terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Minimum number of orphaned terms before cleanup is considered
    pub min_orphan_count: usize,
    /// Fraction of total terms that must be orphaned
    pub orphan_ratio: f64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            min_orphan_count: 10,
            orphan_ratio: 0.15,
        }
    }
}

impl CleanupPolicy {
    /// Returns true if cleanup should run for the given counts
    pub fn should_run(&self, orphans: usize, total: usize) -> bool {
        if orphans == 0 || orphans < self.min_orphan_count {
            return false;
        }
        orphans as f64 > self.orphan_ratio * total as f64
    }
}

#[derive(Debug, Clone)]
struct TermEntry {
    term: String,
    count: u64,
}

/// String interner with per-term usage counts.
#[derive(Debug, Clone)]
pub struct TermDictionary {
    /// term -> id
    ids: HashMap<String, TermId>,
    /// id -> term and usage count
    entries: BTreeMap<TermId, TermEntry>,
    /// Next id to hand out
    next_id: TermId,
    /// Policy used by `cleanup_orphans`
    policy: CleanupPolicy,
}

impl Default for TermDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl TermDictionary {
    /// Creates an empty dictionary with the default cleanup policy
    pub fn new() -> Self {
        Self::with_policy(CleanupPolicy::default())
    }

    /// Creates an empty dictionary with an explicit cleanup policy
    pub fn with_policy(policy: CleanupPolicy) -> Self {
        Self {
            ids: HashMap::new(),
            entries: BTreeMap::new(),
            next_id: 1,
            policy,
        }
    }

    /// Returns the id for `term`, allocating one if needed.
    ///
    /// Increments the usage count. Write path only.
    pub fn get_or_create_id(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.count += 1;
            }
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(term.to_string(), id);
        self.entries.insert(
            id,
            TermEntry {
                term: term.to_string(),
                count: 1,
            },
        );
        id
    }

    /// Same as calling `get_or_create_id` for each term, in order.
    pub fn bulk_get_or_create<S: AsRef<str>>(&mut self, terms: &[S]) -> Vec<TermId> {
        let fresh = terms
            .iter()
            .filter(|t| !self.ids.contains_key(t.as_ref()))
            .count();
        self.ids.reserve(fresh);

        terms
            .iter()
            .map(|t| self.get_or_create_id(t.as_ref()))
            .collect()
    }

    /// Looks up the id for `term` without creating or counting.
    pub fn peek_id(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    /// Returns the term text for an id
    pub fn term(&self, id: TermId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.term.as_str())
    }

    /// Returns the usage count for an id
    pub fn count(&self, id: TermId) -> Option<u64> {
        self.entries.get(&id).map(|e| e.count)
    }

    /// Decrements the usage count, floored at zero.
    pub fn release(&mut self, id: TermId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    /// Adds `n` references to an existing id. Unknown ids are ignored.
    pub(crate) fn add_references(&mut self, id: TermId, n: u64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.count += n;
        }
    }

    /// Sets every usage count to zero.
    pub(crate) fn reset_counts(&mut self) {
        for entry in self.entries.values_mut() {
            entry.count = 0;
        }
    }

    /// Number of terms with a zero usage count
    pub fn orphan_count(&self) -> usize {
        self.entries.values().filter(|e| e.count == 0).count()
    }

    /// Removes orphaned terms using the dictionary's policy.
    ///
    /// Returns the number of removed terms.
    pub fn cleanup_orphans(&mut self, force: bool) -> usize {
        let policy = self.policy;
        self.cleanup_orphans_with(force, &policy)
    }

    /// Removes orphaned terms using an explicit policy.
    pub fn cleanup_orphans_with(&mut self, force: bool, policy: &CleanupPolicy) -> usize {
        let orphans: Vec<TermId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.count == 0)
            .map(|(&id, _)| id)
            .collect();

        if !force && !policy.should_run(orphans.len(), self.entries.len()) {
            debug!(
                orphans = orphans.len(),
                total = self.entries.len(),
                "term cleanup skipped by policy"
            );
            return 0;
        }

        let mut unmapped = BTreeSet::new();
        for id in &orphans {
            if let Some(entry) = self.entries.remove(id) {
                if self.ids.get(&entry.term) == Some(id) {
                    self.ids.remove(&entry.term);
                    unmapped.insert(entry.term);
                }
            }
        }
        // A term persisted under several ids keeps resolving to a survivor
        if !unmapped.is_empty() {
            for (&id, entry) in &self.entries {
                if unmapped.contains(&entry.term) {
                    self.ids.entry(entry.term.clone()).or_insert(id);
                }
            }
        }

        if !orphans.is_empty() {
            info!(
                removed = orphans.len(),
                remaining = self.entries.len(),
                forced = force,
                "removed orphaned terms"
            );
        }
        orphans.len()
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no terms are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The id the next new term will receive
    pub fn next_id(&self) -> TermId {
        self.next_id
    }

    /// Cleanup policy in effect
    pub fn policy(&self) -> &CleanupPolicy {
        &self.policy
    }

    /// Serializes to `{id: term}`. Counts are not persisted.
    pub fn serialize(&self) -> PersistedTerms {
        self.entries
            .iter()
            .map(|(&id, e)| (id, e.term.clone()))
            .collect()
    }

    /// Rebuilds a dictionary from `{id: term}`.
    ///
    /// All counts start at zero. `next_id` is advanced past the largest
    /// loaded id. If the same term appears under several ids, lookups
    /// resolve to the smallest one.
    pub fn deserialize(persisted: PersistedTerms) -> Self {
        Self::deserialize_with_policy(persisted, CleanupPolicy::default())
    }

    /// Same as `deserialize` with an explicit cleanup policy
    pub fn deserialize_with_policy(persisted: PersistedTerms, policy: CleanupPolicy) -> Self {
        let mut dict = Self::with_policy(policy);
        for (id, term) in persisted {
            dict.ids.entry(term.clone()).or_insert(id);
            dict.entries.insert(id, TermEntry { term, count: 0 });
            if id >= dict.next_id {
                dict.next_id = id + 1;
            }
        }
        dict
    }
}
