//! Persistence Tests
//!
//! - Posting lists survive serialize / deserialize at every size
//! - Term dictionaries keep ids and never reuse them
//! - A whole field index reloads with identical query answers
//! - Legacy explicit-only posting lists load

use lineindex::config::IndexConfig;
use lineindex::criteria::Criteria;
use lineindex::index::{FieldIndex, FieldKind, LookupOptions, PersistedPostings, PostingConfig, PostingList};
use lineindex::storage::{MemoryRecords, RecordSource};
use lineindex::terms::TermDictionary;
use proptest::prelude::*;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn build(positions: &[u64]) -> PostingList {
    let mut list = PostingList::new(PostingConfig::default());
    for &p in positions {
        list.add(p);
    }
    list
}

fn reload(list: &PostingList) -> PostingList {
    let json = serde_json::to_string(&list.to_persisted()).unwrap();
    let persisted: PersistedPostings = serde_json::from_str(&json).unwrap();
    PostingList::from_persisted(persisted, PostingConfig::default())
}

// =============================================================================
// Posting lists
// =============================================================================

#[test]
fn test_posting_round_trip_sizes() {
    let empty = build(&[]);
    let small = build(&[3, 9, 27]);
    let large: Vec<u64> = (0..200).chain(500..540).chain([1000, 1002]).collect();
    let large = build(&large);
    assert!(!large.ranges().is_empty());

    for list in [&empty, &small, &large] {
        let loaded = reload(list);
        assert!(loaded.same_positions(list));
        assert_eq!(loaded.to_sorted_vec(), list.to_sorted_vec());
    }
}

#[test]
fn test_persisted_wire_shape() {
    let list = build(&(0..30).chain([40]).collect::<Vec<_>>());
    let json = serde_json::to_value(list.to_persisted()).unwrap();
    assert_eq!(json, json!([[40], [[0, 30]]]));
}

#[test]
fn test_legacy_and_object_ranges_load() {
    let legacy: PersistedPostings = serde_json::from_value(json!([5, 1, 3])).unwrap();
    assert_eq!(
        PostingList::from_persisted(legacy, PostingConfig::default()).to_sorted_vec(),
        vec![1, 3, 5]
    );

    let objects: PersistedPostings =
        serde_json::from_value(json!([[2], [{"start": 10, "count": 10}]])).unwrap();
    let list = PostingList::from_persisted(objects, PostingConfig::default());
    assert_eq!(list.len(), 11);
    assert!(list.contains(19));
    assert!(!list.contains(20));
}

proptest! {
    #[test]
    fn prop_posting_round_trip(
        adds in proptest::collection::vec(0u64..300, 0..400),
        removes in proptest::collection::vec(0u64..300, 0..100),
    ) {
        let mut list = build(&adds);
        for p in &removes {
            list.remove(*p);
        }
        let loaded = reload(&list);
        prop_assert_eq!(loaded.to_sorted_vec(), list.to_sorted_vec());
        for p in 0..300 {
            prop_assert_eq!(loaded.contains(p), list.contains(p));
        }
    }
}

// =============================================================================
// Term dictionary
// =============================================================================

#[test]
fn test_term_dictionary_round_trip() {
    let mut terms = TermDictionary::new();
    let ids = terms.bulk_get_or_create(&["alpha", "beta", "gamma"]);
    terms.release(ids[1]);
    terms.cleanup_orphans(true);

    let json = serde_json::to_string(&terms.serialize()).unwrap();
    let mut loaded = TermDictionary::deserialize(serde_json::from_str(&json).unwrap());

    assert_eq!(loaded.peek_id("alpha"), Some(ids[0]));
    assert_eq!(loaded.peek_id("gamma"), Some(ids[2]));
    assert_eq!(loaded.peek_id("beta"), None);
    assert_eq!(loaded.len(), 2);

    let fresh = loaded.get_or_create_id("delta");
    assert!(fresh > ids[2]);
}

// =============================================================================
// Whole index
// =============================================================================

fn config() -> IndexConfig {
    IndexConfig::new()
        .with_field("city", FieldKind::String)
        .with_field("age", FieldKind::Number)
        .with_term_mapped_field("tags", FieldKind::StringArray)
}

fn answers(index: &FieldIndex, total: u64) -> Vec<Vec<u64>> {
    [
        json!({"city": "Oslo"}),
        json!({"age": {"$gte": 30}}),
        json!({"tags": {"$all": ["x", "y"]}}),
        json!({"tags": {"$nin": ["z"]}}),
        json!({"$not": {"city": {"$in": ["Oslo", "Rome"]}}}),
    ]
    .iter()
    .map(|c| {
        let criteria = Criteria::parse(c).unwrap();
        index
            .query(&criteria, LookupOptions::new(total))
            .positions()
            .unwrap()
            .into_iter()
            .collect()
    })
    .collect()
}

#[test]
fn test_field_index_round_trip() {
    let cities = ["Oslo", "Rome", "Lima"];
    let tags = [vec!["x"], vec!["x", "y"], vec!["y", "z"], vec![]];
    let records: Vec<Value> = (0..60)
        .map(|i| {
            json!({
                "id": i,
                "city": cities[i % 3],
                "age": 18 + (i % 40),
                "tags": tags[i % 4],
            })
        })
        .collect();
    let store = MemoryRecords::from_records(records);

    let mut index = FieldIndex::new(config()).unwrap();
    index.rebuild(store.records()).unwrap();

    let snapshot = index.to_json().unwrap();
    let text = serde_json::to_string(&snapshot).unwrap();
    let loaded = FieldIndex::from_json(config(), serde_json::from_str(&text).unwrap()).unwrap();

    assert_eq!(answers(&loaded, 60), answers(&index, 60));
    assert_eq!(loaded.serialize(), index.serialize());

    let x = index.terms().peek_id("x").unwrap();
    assert_eq!(loaded.terms().count(x), index.terms().count(x));
    assert_eq!(loaded.terms().orphan_count(), 0);
}

#[test]
fn test_term_keys_accept_literal_strings() {
    let snapshot = json!({
        "index": {"tags": {"x": [[0, 2], []], "1": [[1], []]}},
        "terms": {"1": "x"}
    });
    let index = FieldIndex::from_json(config(), snapshot).unwrap();

    let criteria = Criteria::parse(&json!({"tags": "x"})).unwrap();
    let found: Vec<u64> = index
        .query(&criteria, LookupOptions::new(3))
        .positions()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(found, vec![0, 1, 2]);
    assert_eq!(index.terms().count(1), Some(3));
}
