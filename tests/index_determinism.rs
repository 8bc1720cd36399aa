//! Index Determinism Tests
//!
//! Tests for index invariants:
//! - Rebuild from the same records gives the same persisted index
//! - Lookups are repeatable
//! - Remove only drops positions owned by the removed record
//! - Update moves a record between value-keys

use lineindex::config::IndexConfig;
use lineindex::criteria::Criteria;
use lineindex::index::{FieldIndex, FieldKind, IndexHealth, LookupOptions};
use lineindex::storage::{MemoryRecords, RecordSource};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn config() -> IndexConfig {
    IndexConfig::new()
        .with_field("name", FieldKind::String)
        .with_field("score", FieldKind::Number)
        .with_term_mapped_field("tags", FieldKind::StringArray)
}

fn make_record(id: u64, name: &str, score: i64, tags: &[&str]) -> Value {
    json!({ "id": id, "name": name, "score": score, "tags": tags })
}

fn store() -> MemoryRecords {
    MemoryRecords::from_records(vec![
        make_record(1, "Alice", 90, &["admin", "ops"]),
        make_record(2, "Bob", 75, &["ops"]),
        make_record(3, "Alice", 60, &[]),
        make_record(4, "Dana", 90, &["admin"]),
    ])
}

fn lookup(index: &FieldIndex, criteria: Value, total: u64) -> Vec<u64> {
    let criteria = Criteria::parse(&criteria).unwrap();
    index
        .query(&criteria, LookupOptions::new(total))
        .positions()
        .unwrap()
        .into_iter()
        .collect()
}

// =============================================================================
// Rebuild Determinism
// =============================================================================

/// Two rebuilds over the same records serialize identically.
#[test]
fn test_rebuild_deterministic() {
    let store = store();

    let mut first = FieldIndex::new(config()).unwrap();
    first.rebuild(store.records()).unwrap();
    let mut second = FieldIndex::new(config()).unwrap();
    second.rebuild(store.records()).unwrap();

    assert_eq!(first.serialize(), second.serialize());
    assert_eq!(first.terms().serialize(), second.terms().serialize());
}

/// Rebuild equals adding the records one at a time.
#[test]
fn test_rebuild_matches_incremental_adds() {
    let store = store();

    let mut rebuilt = FieldIndex::new(config()).unwrap();
    rebuilt.rebuild(store.records()).unwrap();

    let mut incremental = FieldIndex::new(config()).unwrap();
    for (position, record) in store.records() {
        incremental.add(&record, position).unwrap();
    }

    assert_eq!(rebuilt.serialize(), incremental.serialize());
}

/// Batch add equals single adds.
#[test]
fn test_add_batch_matches_single_adds() {
    let records: Vec<Value> = store().records().map(|(_, r)| r.into_owned()).collect();

    let mut batch = FieldIndex::new(config()).unwrap();
    batch.add_batch(&records, 10).unwrap();

    let mut single = FieldIndex::new(config()).unwrap();
    for (i, record) in records.iter().enumerate() {
        single.add(record, 10 + i as u64).unwrap();
    }

    assert_eq!(batch.serialize(), single.serialize());
}

/// A bad record in a batch leaves the index untouched.
#[test]
fn test_add_batch_is_all_or_nothing() {
    let mut index = FieldIndex::new(config()).unwrap();
    let err = index
        .add_batch(&[make_record(1, "Ann", 1, &[]), json!("not a record")], 0)
        .unwrap_err();
    assert_eq!(err.code(), "LINEINDEX_INVALID_RECORD");
    assert!(index.serialize().is_empty());
}

// =============================================================================
// Deterministic Lookup Tests
// =============================================================================

/// Same lookup returns same result.
#[test]
fn test_lookup_deterministic() {
    let store = store();
    let mut index = FieldIndex::new(config()).unwrap();
    index.rebuild(store.records()).unwrap();

    let expected = lookup(&index, json!({"name": "Alice"}), 4);
    assert_eq!(expected, vec![0, 2]);
    for _ in 0..100 {
        assert_eq!(lookup(&index, json!({"name": "Alice"}), 4), expected);
    }
}

/// Unindexed fields cannot be answered.
#[test]
fn test_unindexed_field_cannot_index() {
    let mut index = FieldIndex::new(config()).unwrap();
    index.add(&make_record(1, "Ann", 1, &[]), 0).unwrap();

    let criteria = Criteria::parse(&json!({"email": "a@b"})).unwrap();
    assert!(!index.query(&criteria, LookupOptions::new(1)).is_indexed());
}

// =============================================================================
// Remove / Update
// =============================================================================

/// Remove keeps positions of other records sharing the value.
#[test]
fn test_remove_keeps_shared_value() {
    let store = store();
    let mut index = FieldIndex::new(config()).unwrap();
    index.rebuild(store.records()).unwrap();

    let removed = index.remove(&make_record(1, "Alice", 90, &["admin", "ops"]), &store).unwrap();
    assert_eq!(removed, 4);

    assert_eq!(lookup(&index, json!({"name": "Alice"}), 4), vec![2]);
    assert_eq!(lookup(&index, json!({"score": 90}), 4), vec![3]);
    assert_eq!(lookup(&index, json!({"tags": "admin"}), 4), vec![3]);
    assert_eq!(lookup(&index, json!({"tags": "ops"}), 4), vec![1]);
}

/// Remove requires the id field.
#[test]
fn test_remove_without_id_fails() {
    let store = store();
    let mut index = FieldIndex::new(config()).unwrap();
    index.rebuild(store.records()).unwrap();

    let err = index.remove(&json!({"name": "Alice"}), &store).unwrap_err();
    assert_eq!(err.code(), "LINEINDEX_MISSING_RECORD_ID");
}

/// Update moves the position from the old value-key to the new one.
#[test]
fn test_update_replaces_entry() {
    let mut store = store();
    let mut index = FieldIndex::new(config()).unwrap();
    index.rebuild(store.records()).unwrap();

    let old = make_record(2, "Bob", 75, &["ops"]);
    let new = make_record(2, "Robert", 80, &["dev"]);
    store.replace(1, new.clone());
    index.update(&old, &new, 1, &store).unwrap();

    assert!(lookup(&index, json!({"name": "Bob"}), 4).is_empty());
    assert_eq!(lookup(&index, json!({"name": "Robert"}), 4), vec![1]);
    assert_eq!(lookup(&index, json!({"tags": "ops"}), 4), vec![0]);
    assert_eq!(lookup(&index, json!({"tags": "dev"}), 4), vec![1]);
}

/// Empty posting lists disappear after their last position goes.
#[test]
fn test_remove_at_drops_empty_lists() {
    let mut index = FieldIndex::new(config()).unwrap();
    let record = make_record(9, "Solo", 1, &["only"]);
    index.add(&record, 7).unwrap();

    assert!(index.remove_at(&record, 7).unwrap());
    assert!(!index.remove_at(&record, 7).unwrap());
    assert!(index.serialize().is_empty());
    assert_eq!(index.health("name"), Some(IndexHealth::Empty));
    assert_eq!(index.terms().orphan_count(), 1);
}
