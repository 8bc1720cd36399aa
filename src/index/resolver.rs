//! Value-key resolution per field
//!
//! A `ValueResolver` is picked once per field at the start of an operation
//! so the per-value code never re-checks whether the field is term-mapped.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::terms::{TermDictionary, TermId};

use super::errors::{json_type_name, IndexError, IndexResult};
use super::field_type::{literal_key, FieldKind, FieldSpec};

/// Value-key read back from a record, with the term it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub term: Option<TermId>,
}

/// Keys are the literal values
#[derive(Debug, Clone, Copy)]
pub struct PlainResolver {
    kind: FieldKind,
}

/// Keys are decimal term ids from the dictionary
#[derive(Debug, Clone, Copy)]
pub struct TermMappedResolver {
    kind: FieldKind,
}

/// Per-field key resolution strategy
#[derive(Debug, Clone, Copy)]
pub enum ValueResolver {
    Plain(PlainResolver),
    TermMapped(TermMappedResolver),
}

impl ValueResolver {
    /// Picks the resolver for a field
    pub fn for_field(spec: &FieldSpec) -> Self {
        if spec.term_mapping {
            ValueResolver::TermMapped(TermMappedResolver { kind: spec.kind })
        } else {
            ValueResolver::Plain(PlainResolver { kind: spec.kind })
        }
    }

    /// Declared kind of the field
    pub fn kind(&self) -> FieldKind {
        match self {
            ValueResolver::Plain(r) => r.kind,
            ValueResolver::TermMapped(r) => r.kind,
        }
    }

    /// Returns true for term-mapped fields
    pub fn is_term_mapped(&self) -> bool {
        matches!(self, ValueResolver::TermMapped(_))
    }

    /// Validates the parts of a record this resolver reads without
    /// touching the dictionary
    pub fn check(&self, field: &str, record: &Map<String, Value>) -> IndexResult<()> {
        match self {
            ValueResolver::Plain(_) => Ok(()),
            ValueResolver::TermMapped(_) => side_channel_ids(field, record).map(|_| ()),
        }
    }

    /// Distinct keys for a record's field on the write path.
    ///
    /// Term-mapped fields prefer ids from the `<field>Ids` side-channel.
    /// Raw strings are interned (and counted) only when no ids are given.
    /// With `count_side_channel`, side-channel ids are counted as references
    /// too (used when rebuilding from scratch).
    pub fn intern_keys(
        &self,
        field: &str,
        record: &Map<String, Value>,
        terms: &mut TermDictionary,
        count_side_channel: bool,
    ) -> IndexResult<Vec<String>> {
        match self {
            ValueResolver::Plain(r) => Ok(r.keys(field, record)),
            ValueResolver::TermMapped(r) => {
                if let Some(ids) = side_channel_ids(field, record)? {
                    if count_side_channel {
                        for &id in &ids {
                            terms.add_references(id, 1);
                        }
                    }
                    return Ok(ids.iter().map(TermId::to_string).collect());
                }
                let strings = r.strings(field, record);
                let ids = terms.bulk_get_or_create(&strings);
                Ok(ids.iter().map(TermId::to_string).collect())
            }
        }
    }

    /// Distinct keys for a record's field without touching the dictionary.
    ///
    /// Strings that were never interned are skipped; no posting list can
    /// exist for them.
    pub fn existing_keys(
        &self,
        field: &str,
        record: &Map<String, Value>,
        terms: &TermDictionary,
    ) -> IndexResult<Vec<ResolvedKey>> {
        match self {
            ValueResolver::Plain(r) => Ok(r
                .keys(field, record)
                .into_iter()
                .map(|key| ResolvedKey { key, term: None })
                .collect()),
            ValueResolver::TermMapped(r) => {
                let ids = match side_channel_ids(field, record)? {
                    Some(ids) => ids,
                    None => {
                        let mut ids: Vec<TermId> = r
                            .strings(field, record)
                            .iter()
                            .filter_map(|s| terms.peek_id(s))
                            .collect();
                        ids.sort_unstable();
                        ids.dedup();
                        ids
                    }
                };
                Ok(ids
                    .into_iter()
                    .map(|id| ResolvedKey {
                        key: id.to_string(),
                        term: Some(id),
                    })
                    .collect())
            }
        }
    }

    /// Key for a query operand. Never creates terms.
    ///
    /// None means no record can hold the value under this field.
    pub fn lookup_key(&self, value: &Value, terms: &TermDictionary) -> Option<String> {
        if !self.kind().accepts(value) {
            return None;
        }
        match self {
            ValueResolver::Plain(_) => literal_key(value),
            ValueResolver::TermMapped(_) => value
                .as_str()
                .and_then(|s| terms.peek_id(s))
                .map(|id| id.to_string()),
        }
    }

    /// Text a stored key stands for
    pub fn key_text<'a>(&self, key: &'a str, terms: &'a TermDictionary) -> Option<&'a str> {
        match self {
            ValueResolver::Plain(_) => Some(key),
            ValueResolver::TermMapped(_) => key.parse::<TermId>().ok().and_then(|id| terms.term(id)),
        }
    }
}

impl PlainResolver {
    fn keys(&self, field: &str, record: &Map<String, Value>) -> Vec<String> {
        let keys: BTreeSet<String> = self
            .kind
            .element_values(record.get(field))
            .into_iter()
            .filter_map(literal_key)
            .collect();
        keys.into_iter().collect()
    }
}

impl TermMappedResolver {
    fn strings<'r>(&self, field: &str, record: &'r Map<String, Value>) -> Vec<&'r str> {
        let strings: BTreeSet<&str> = self
            .kind
            .element_values(record.get(field))
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        strings.into_iter().collect()
    }
}

/// Reads the `<field>Ids` side-channel, if present
fn side_channel_ids(field: &str, record: &Map<String, Value>) -> IndexResult<Option<Vec<TermId>>> {
    let name = format!("{}Ids", field);
    let items = match record.get(&name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(IndexError::InvalidTermIds {
                field: field.to_string(),
                reason: format!("found {}", json_type_name(other)),
            })
        }
    };

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        match item.as_u64() {
            Some(id) => ids.push(id),
            None => {
                return Err(IndexError::InvalidTermIds {
                    field: field.to_string(),
                    reason: format!("element {} is not a term id", item),
                })
            }
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(Some(ids))
}
