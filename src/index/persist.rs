//! Persisted index layout
//!
//! ```json
//! {
//!   "category": { "fruits": [[0, 1], []] },
//!   "tags": { "1": [[], [[0, 30]]], "2": [[4], []] }
//! }
//! ```
//!
//! Keys of term-mapped fields are decimal term ids. A persisted index that
//! still holds literal strings for such a field is converted on load by
//! looking up (never creating) ids; unknown strings are dropped as orphans.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::terms::{PersistedTerms, TermDictionary, TermId};

use super::errors::{IndexError, IndexResult};
use super::field_type::number_key;
use super::manager::{FieldIndex, FieldPostings};
use super::posting::{PersistedPostings, PostingList};
use super::resolver::ValueResolver;

/// `{field: {valueKey: [explicit, ranges]}}`
pub type PersistedIndex = BTreeMap<String, BTreeMap<String, PersistedPostings>>;

/// Index and term dictionary persisted together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Posting lists
    pub index: PersistedIndex,
    /// Term dictionary as `{id: term}`
    #[serde(default)]
    pub terms: PersistedTerms,
}

impl FieldIndex {
    /// Persisted form of every posting list
    pub fn serialize(&self) -> PersistedIndex {
        self.data
            .iter()
            .map(|(field, keys)| {
                let keys = keys
                    .iter()
                    .map(|(key, list)| (key.clone(), list.to_persisted()))
                    .collect();
                (field.clone(), keys)
            })
            .collect()
    }

    /// Rebuilds an index from its persisted form over `terms`.
    ///
    /// Fields that are not configured are skipped. Term reference counts
    /// are recomputed from the loaded posting lists.
    pub fn deserialize(
        config: IndexConfig,
        persisted: PersistedIndex,
        terms: TermDictionary,
    ) -> IndexResult<Self> {
        let mut index = FieldIndex::with_terms(config, terms)?;
        let postings = index.config.postings;

        for (field, keys) in persisted {
            let Some(resolver) = index.resolver(&field) else {
                warn!(field = %field, "skipping persisted postings for unindexed field");
                continue;
            };

            let mut loaded = FieldPostings::new();
            let mut dropped = 0usize;
            for (key, persisted_list) in keys {
                let list = PostingList::from_persisted(persisted_list, postings);
                if list.is_empty() {
                    continue;
                }
                let key = match resolver {
                    ValueResolver::Plain(_) if resolver.kind().is_numeric() => {
                        match key.parse::<Number>() {
                            Ok(n) => number_key(&n),
                            Err(_) => key,
                        }
                    }
                    ValueResolver::Plain(_) => key,
                    ValueResolver::TermMapped(_) => match term_key(&key, &index.terms) {
                        Some(id) => id.to_string(),
                        None => {
                            dropped += 1;
                            continue;
                        }
                    },
                };
                match loaded.get_mut(&key) {
                    Some(existing) => {
                        for position in list.iter() {
                            existing.add(position);
                        }
                    }
                    None => {
                        loaded.insert(key, list);
                    }
                }
            }

            if dropped > 0 {
                warn!(field = %field, dropped, "dropped orphaned persisted keys with unknown terms");
            }
            if !loaded.is_empty() {
                index.data.insert(field, loaded);
            }
        }

        index.recount_terms();
        info!(
            fields = index.data.len(),
            terms = index.terms.len(),
            "loaded persisted field index"
        );
        Ok(index)
    }

    /// Index and terms as one JSON document
    pub fn to_json(&self) -> IndexResult<Value> {
        let snapshot = IndexSnapshot {
            index: self.serialize(),
            terms: self.terms.serialize(),
        };
        serde_json::to_value(snapshot).map_err(|e| IndexError::InvalidPersisted(e.to_string()))
    }

    /// Loads an index written by `to_json`
    pub fn from_json(config: IndexConfig, value: Value) -> IndexResult<Self> {
        let snapshot: IndexSnapshot =
            serde_json::from_value(value).map_err(|e| IndexError::InvalidPersisted(e.to_string()))?;
        let terms = TermDictionary::deserialize_with_policy(snapshot.terms, config.cleanup);
        Self::deserialize(config, snapshot.index, terms)
    }

    /// Sets every term's count to the number of positions referencing it
    fn recount_terms(&mut self) {
        self.terms.reset_counts();
        for (field, keys) in &self.data {
            if !self.resolvers.get(field).is_some_and(ValueResolver::is_term_mapped) {
                continue;
            }
            for (key, list) in keys {
                if let Ok(id) = key.parse::<TermId>() {
                    self.terms.add_references(id, list.len());
                }
            }
        }
        debug!(orphans = self.terms.orphan_count(), "recounted term references");
    }
}

/// Term id for a persisted key of a term-mapped field.
///
/// A decimal key naming a known id is that id. Any other key, including a
/// numeric one with no such id, is read as literal term text.
fn term_key(key: &str, terms: &TermDictionary) -> Option<TermId> {
    key.parse::<TermId>()
        .ok()
        .filter(|&id| terms.term(id).is_some())
        .or_else(|| terms.peek_id(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FieldKind;
    use crate::storage::Position;
    use serde_json::json;

    fn config() -> IndexConfig {
        IndexConfig::new()
            .with_field("category", FieldKind::String)
            .with_term_mapped_field("tags", FieldKind::StringArray)
    }

    fn sorted(index: &FieldIndex, field: &str, key: &str) -> Vec<Position> {
        index
            .postings(field, key)
            .map(PostingList::to_sorted_vec)
            .unwrap_or_default()
    }

    #[test]
    fn test_serialized_shape() {
        let mut index = FieldIndex::new(config()).unwrap();
        for p in 0..30 {
            index.add(&json!({"id": p, "category": "bulk"}), p).unwrap();
        }
        index.add(&json!({"id": 99, "category": "one"}), 42).unwrap();

        let value = serde_json::to_value(index.serialize()).unwrap();
        assert_eq!(
            value,
            json!({"category": {"bulk": [[], [[0, 30]]], "one": [[42], []]}})
        );
    }

    #[test]
    fn test_round_trip_with_terms() {
        let mut index = FieldIndex::new(config()).unwrap();
        index.add(&json!({"id": 1, "tags": ["a", "b"]}), 0).unwrap();
        index.add(&json!({"id": 2, "tags": ["b"]}), 1).unwrap();

        let json = index.to_json().unwrap();
        let loaded = FieldIndex::from_json(config(), json).unwrap();

        assert_eq!(loaded.serialize(), index.serialize());
        let b = loaded.terms().peek_id("b").unwrap();
        assert_eq!(loaded.terms().count(b), Some(2));
        assert_eq!(loaded.terms().next_id(), index.terms().next_id());
    }

    #[test]
    fn test_literal_keys_converted_for_term_mapped_field() {
        let mut terms = TermDictionary::new();
        let a = terms.get_or_create_id("a");

        let persisted: PersistedIndex = serde_json::from_value(json!({
            "tags": {
                "a": [[0], []],
                "ghost": [[1], []]
            }
        }))
        .unwrap();
        let index = FieldIndex::deserialize(config(), persisted, terms).unwrap();

        assert_eq!(sorted(&index, "tags", &a.to_string()), vec![0]);
        assert!(index.postings("tags", "a").is_none());
        assert_eq!(index.field_keys("tags").count(), 1);
        assert_eq!(index.terms().peek_id("ghost"), None);
        assert_eq!(index.terms().count(a), Some(1));
    }

    #[test]
    fn test_float_keys_are_canonicalized_on_load() {
        let config = config().with_field("n", FieldKind::Number);
        let persisted: PersistedIndex = serde_json::from_value(json!({
            "n": {
                "1.0": [[0], []],
                "1": [[1], []],
                "-0.0": [[2], []]
            }
        }))
        .unwrap();
        let index = FieldIndex::deserialize(config, persisted, TermDictionary::new()).unwrap();

        assert_eq!(sorted(&index, "n", "1"), vec![0, 1]);
        assert_eq!(sorted(&index, "n", "0"), vec![2]);
        assert_eq!(index.field_keys("n").count(), 2);
    }

    #[test]
    fn test_numeric_literal_key_without_matching_id() {
        let mut terms = TermDictionary::new();
        let tag = terms.get_or_create_id("42");
        assert_ne!(tag, 42);

        let persisted: PersistedIndex = serde_json::from_value(json!({
            "tags": {
                "42": [[3], []],
                "7": [[4], []]
            }
        }))
        .unwrap();
        let index = FieldIndex::deserialize(config(), persisted, terms).unwrap();

        assert_eq!(sorted(&index, "tags", &tag.to_string()), vec![3]);
        assert_eq!(index.field_keys("tags").count(), 1);
        assert_eq!(index.terms().count(tag), Some(1));
    }

    #[test]
    fn test_literal_and_id_keys_merge() {
        let mut terms = TermDictionary::new();
        let a = terms.get_or_create_id("a");

        let persisted: PersistedIndex = serde_json::from_value(json!({
            "tags": {
                "1": [[0], []],
                "a": [[5], []],
                "77": [[9], []]
            }
        }))
        .unwrap();
        let index = FieldIndex::deserialize(config(), persisted, terms).unwrap();

        assert_eq!(sorted(&index, "tags", &a.to_string()), vec![0, 5]);
        assert!(index.postings("tags", "77").is_none());
    }

    #[test]
    fn test_legacy_and_unindexed_fields() {
        let persisted: PersistedIndex = serde_json::from_value(json!({
            "category": {"x": [3, 1, 2], "empty": [[], []]},
            "unknown": {"y": [[0], []]}
        }))
        .unwrap();
        let index = FieldIndex::deserialize(config(), persisted, TermDictionary::new()).unwrap();

        assert_eq!(sorted(&index, "category", "x"), vec![1, 2, 3]);
        assert!(index.postings("category", "empty").is_none());
        assert!(index.field_postings("unknown").is_none());
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let err = FieldIndex::from_json(config(), json!({"index": {"category": 5}})).unwrap_err();
        assert_eq!(err.code(), "LINEINDEX_INVALID_PERSISTED_INDEX");
    }
}
