//! Field index maintenance
//!
//! Keeps one posting list per (field, value-key) pair, updated
//! incrementally as the storage layer writes.
//!
//! # API
//!
//! - `add(record, position)` - Index one record
//! - `add_batch(records, start)` - Index consecutive records
//! - `remove(record, resolver)` - Unindex a record, confirming ownership
//! - `remove_at(record, position)` - Unindex a record at a known position
//! - `update(old, new, position, resolver)` - Remove then add
//! - `rebuild(records)` - Clear and reindex a full generation
//!
//! # Invariants
//!
//! - A posting list holds exactly the positions whose record has that value
//! - Empty posting lists are removed from the map
//! - Field and key iteration is deterministic (BTreeMap)

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::storage::{Position, RecordResolver};
use crate::terms::TermDictionary;

use super::errors::{IndexError, IndexResult};
use super::field_type::FieldSpec;
use super::posting::PostingList;
use super::resolver::ValueResolver;

/// Value-key to posting list, for one field
pub type FieldPostings = BTreeMap<String, PostingList>;

/// Health of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexHealth {
    /// Posting lists exist and agree with every sampled record
    Healthy,
    /// No posting lists, and nothing sampled says there should be
    Empty,
    /// A sampled record holds a value the index does not have at its position
    Missing,
}

/// Per-field statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    /// Number of value-keys
    pub distinct_keys: usize,
    /// Sum of posting list lengths
    pub postings: u64,
    /// Health without sampling
    pub health: IndexHealth,
}

/// Whole-index statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    /// Indexed fields
    pub fields: BTreeMap<String, FieldStats>,
    /// Terms in the dictionary
    pub terms: usize,
    /// Terms with no remaining references
    pub orphaned_terms: usize,
}

/// Per-field posting-list index
#[derive(Debug, Clone)]
pub struct FieldIndex {
    pub(super) config: IndexConfig,
    pub(super) resolvers: BTreeMap<String, ValueResolver>,
    pub(super) data: BTreeMap<String, FieldPostings>,
    pub(super) terms: TermDictionary,
}

impl FieldIndex {
    /// Creates an empty index with its own term dictionary
    pub fn new(config: IndexConfig) -> IndexResult<Self> {
        let terms = TermDictionary::with_policy(config.cleanup);
        Self::with_terms(config, terms)
    }

    /// Creates an empty index over an existing term dictionary
    pub fn with_terms(config: IndexConfig, terms: TermDictionary) -> IndexResult<Self> {
        config.validate()?;
        let resolvers = config
            .fields
            .iter()
            .map(|(name, spec)| (name.clone(), ValueResolver::for_field(spec)))
            .collect();
        Ok(Self {
            config,
            resolvers,
            data: BTreeMap::new(),
            terms,
        })
    }

    /// Index configuration
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Term dictionary shared by term-mapped fields
    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    /// Mutable term dictionary (e.g. for orphan cleanup)
    pub fn terms_mut(&mut self) -> &mut TermDictionary {
        &mut self.terms
    }

    /// Returns true if the field is configured as indexed
    pub fn is_indexed(&self, field: &str) -> bool {
        self.resolvers.contains_key(field)
    }

    /// Configuration of an indexed field
    pub fn field_spec(&self, field: &str) -> Option<&FieldSpec> {
        self.config.fields.get(field)
    }

    /// Indexed field names in order
    pub fn indexed_fields(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    pub(crate) fn resolver(&self, field: &str) -> Option<ValueResolver> {
        self.resolvers.get(field).copied()
    }

    /// Posting list for a (field, value-key) pair
    pub fn postings(&self, field: &str, key: &str) -> Option<&PostingList> {
        self.data.get(field).and_then(|keys| keys.get(key))
    }

    /// Value-keys present for a field
    pub fn field_keys(&self, field: &str) -> impl Iterator<Item = &str> {
        self.data
            .get(field)
            .into_iter()
            .flat_map(|keys| keys.keys().map(String::as_str))
    }

    pub(crate) fn field_postings(&self, field: &str) -> Option<&FieldPostings> {
        self.data.get(field)
    }

    // ==================
    // Writes
    // ==================

    /// Indexes one record at `position`.
    ///
    /// Fields that are missing, null, or of another JSON type are skipped.
    pub fn add(&mut self, record: &Value, position: Position) -> IndexResult<()> {
        let record = as_record(record)?;
        self.check(record)?;
        self.add_fields(record, position, false)
    }

    /// Indexes `records[i]` at `start + i`, grouping positions per key.
    ///
    /// Every record is validated before anything is indexed.
    pub fn add_batch(&mut self, records: &[Value], start: Position) -> IndexResult<()> {
        let mut objects = Vec::with_capacity(records.len());
        for record in records {
            let record = as_record(record)?;
            self.check(record)?;
            objects.push(record);
        }

        let mut grouped: BTreeMap<&str, BTreeMap<String, Vec<Position>>> = BTreeMap::new();
        for (offset, record) in objects.into_iter().enumerate() {
            let position = start + offset as Position;
            for (field, resolver) in &self.resolvers {
                let keys = resolver.intern_keys(field, record, &mut self.terms, false)?;
                let by_key = grouped.entry(field.as_str()).or_default();
                for key in keys {
                    by_key.entry(key).or_default().push(position);
                }
            }
        }

        let postings = self.config.postings;
        for (field, by_key) in grouped {
            let keys = self.data.entry(field.to_string()).or_default();
            for (key, positions) in by_key {
                let list = keys
                    .entry(key)
                    .or_insert_with(|| PostingList::new(postings));
                for position in positions {
                    list.add(position);
                }
            }
        }

        debug!(count = records.len(), start, "indexed record batch");
        Ok(())
    }

    /// Unindexes a record, returning how many positions were removed.
    ///
    /// A position is removed only when the record stored there has the same
    /// id, since other records may share the value.
    pub fn remove<R: RecordResolver + ?Sized>(
        &mut self,
        record: &Value,
        resolver: &R,
    ) -> IndexResult<usize> {
        let record = as_record(record)?;
        self.check(record)?;
        let id_field = self.config.id_field.as_str();
        let id = match record.get(id_field) {
            None | Some(Value::Null) => {
                return Err(IndexError::MissingRecordId {
                    id_field: id_field.to_string(),
                })
            }
            Some(id) => id,
        };

        let mut removed = 0;
        for (field, value_resolver) in &self.resolvers {
            let resolved = value_resolver.existing_keys(field, record, &self.terms)?;
            let Some(keys) = self.data.get_mut(field) else {
                continue;
            };

            for resolved_key in resolved {
                let Some(list) = keys.get_mut(&resolved_key.key) else {
                    continue;
                };
                let owned: Vec<Position> = list
                    .iter()
                    .filter(|&p| {
                        resolver
                            .record_at(p)
                            .is_some_and(|stored| stored.get(id_field) == Some(id))
                    })
                    .collect();
                for &position in &owned {
                    list.remove(position);
                }
                if list.is_empty() {
                    keys.remove(&resolved_key.key);
                }
                if !owned.is_empty() {
                    removed += owned.len();
                    if let Some(term) = resolved_key.term {
                        self.terms.release(term);
                    }
                }
            }
            if keys.is_empty() {
                self.data.remove(field);
            }
        }
        Ok(removed)
    }

    /// Unindexes a record known to live at `position`.
    ///
    /// Returns false if no posting list held the position.
    pub fn remove_at(&mut self, record: &Value, position: Position) -> IndexResult<bool> {
        let record = as_record(record)?;
        self.check(record)?;

        let mut any = false;
        for (field, resolver) in &self.resolvers {
            let resolved = resolver.existing_keys(field, record, &self.terms)?;
            let Some(keys) = self.data.get_mut(field) else {
                continue;
            };
            for resolved_key in resolved {
                let Some(list) = keys.get_mut(&resolved_key.key) else {
                    continue;
                };
                if list.remove(position) {
                    any = true;
                    if let Some(term) = resolved_key.term {
                        self.terms.release(term);
                    }
                }
                if list.is_empty() {
                    keys.remove(&resolved_key.key);
                }
            }
            if keys.is_empty() {
                self.data.remove(field);
            }
        }
        Ok(any)
    }

    /// Replaces `old` with `new` at `position`
    pub fn update<R: RecordResolver + ?Sized>(
        &mut self,
        old: &Value,
        new: &Value,
        position: Position,
        resolver: &R,
    ) -> IndexResult<()> {
        let new_record = as_record(new)?;
        self.check(new_record)?;
        self.remove(old, resolver)?;
        self.add_fields(new_record, position, false)
    }

    /// Drops every posting list. Term references are reset to zero.
    pub fn clear(&mut self) {
        self.data.clear();
        self.terms.reset_counts();
    }

    /// Clears and reindexes a full generation of records.
    ///
    /// Side-channel term ids count as references here since the previous
    /// counts were discarded. Returns the number of records indexed.
    pub fn rebuild<'a, I>(&mut self, records: I) -> IndexResult<usize>
    where
        I: IntoIterator<Item = (Position, Cow<'a, Value>)>,
    {
        self.clear();
        let mut indexed = 0;
        for (position, record) in records {
            let record = as_record(&record)?;
            self.check(record)?;
            self.add_fields(record, position, true)?;
            indexed += 1;
        }
        info!(
            records = indexed,
            fields = self.data.len(),
            "rebuilt field index"
        );
        Ok(indexed)
    }

    fn check(&self, record: &Map<String, Value>) -> IndexResult<()> {
        for (field, resolver) in &self.resolvers {
            resolver.check(field, record)?;
        }
        Ok(())
    }

    fn add_fields(
        &mut self,
        record: &Map<String, Value>,
        position: Position,
        count_side_channel: bool,
    ) -> IndexResult<()> {
        let postings = self.config.postings;
        for (field, resolver) in &self.resolvers {
            let keys = resolver.intern_keys(field, record, &mut self.terms, count_side_channel)?;
            if keys.is_empty() {
                continue;
            }
            let by_key = self.data.entry(field.clone()).or_default();
            for key in keys {
                by_key
                    .entry(key)
                    .or_insert_with(|| PostingList::new(postings))
                    .add(position);
            }
        }
        Ok(())
    }

    // ==================
    // Introspection
    // ==================

    /// Health of a field without sampling records. None if not indexed.
    pub fn health(&self, field: &str) -> Option<IndexHealth> {
        if !self.is_indexed(field) {
            return None;
        }
        match self.data.get(field) {
            Some(keys) if !keys.is_empty() => Some(IndexHealth::Healthy),
            _ => Some(IndexHealth::Empty),
        }
    }

    /// Checks sampled records against the index.
    ///
    /// Reports `Missing` as soon as a sampled record holds an indexable value
    /// whose posting list does not contain the record's position.
    pub fn verify_sample<'a, I>(&self, field: &str, sample: I) -> Option<IndexHealth>
    where
        I: IntoIterator<Item = (Position, Cow<'a, Value>)>,
    {
        let resolver = self.resolver(field)?;
        for (position, record) in sample {
            let Some(record) = record.as_object() else {
                continue;
            };
            // unknown terms and malformed side-channels both mean the index
            // never saw this value
            let expected = match resolver.existing_keys(field, record, &self.terms) {
                Ok(keys) => keys,
                Err(_) => return Some(IndexHealth::Missing),
            };
            let indexable = !resolver.kind().element_values(record.get(field)).is_empty();
            if indexable && expected.is_empty() {
                return Some(IndexHealth::Missing);
            }
            let all_present = expected.iter().all(|k| {
                self.postings(field, &k.key)
                    .is_some_and(|list| list.contains(position))
            });
            if !all_present {
                return Some(IndexHealth::Missing);
            }
        }
        self.health(field)
    }

    /// Statistics for every indexed field
    pub fn stats(&self) -> IndexStats {
        let fields = self
            .resolvers
            .keys()
            .map(|field| {
                let (distinct_keys, postings) = match self.data.get(field) {
                    Some(keys) => (keys.len(), keys.values().map(PostingList::len).sum()),
                    None => (0, 0),
                };
                let health = self.health(field).unwrap_or(IndexHealth::Empty);
                (
                    field.clone(),
                    FieldStats {
                        distinct_keys,
                        postings,
                        health,
                    },
                )
            })
            .collect();
        IndexStats {
            fields,
            terms: self.terms.len(),
            orphaned_terms: self.terms.orphan_count(),
        }
    }
}

fn as_record(value: &Value) -> IndexResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| IndexError::invalid_record(value))
}
