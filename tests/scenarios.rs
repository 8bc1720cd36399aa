//! End-to-end scenarios
//!
//! Small fixed data sets exercising each component through its public API:
//! - Equality lookups on a plain field
//! - Term-mapped array fields with `$all` / `$in`
//! - Posting list compaction boundaries
//! - Complements inside `$and`
//! - Orphaned term cleanup policy

use lineindex::config::IndexConfig;
use lineindex::criteria::Criteria;
use lineindex::index::{FieldIndex, FieldKind, Lookup, LookupOptions, PostingConfig, PostingList};
use lineindex::planner::{QueryOptions, QueryPlanner, Strategy};
use lineindex::storage::{MemoryRecords, RecordSource};
use lineindex::terms::TermDictionary;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn positions(index: &FieldIndex, criteria: Value, total: u64) -> Vec<u64> {
    let criteria = Criteria::parse(&criteria).unwrap();
    match index.query(&criteria, LookupOptions::new(total)) {
        Lookup::Positions(set) => set.into_iter().collect(),
        Lookup::CannotIndex(reason) => panic!("expected an index answer, got: {reason}"),
    }
}

fn tags_index() -> FieldIndex {
    FieldIndex::new(IndexConfig::new().with_term_mapped_field("tags", FieldKind::StringArray))
        .unwrap()
}

// =============================================================================
// Plain field equality
// =============================================================================

#[test]
fn test_category_equality() {
    let mut index =
        FieldIndex::new(IndexConfig::new().with_field("category", FieldKind::String)).unwrap();
    index.add(&json!({"category": "fruits"}), 0).unwrap();
    index.add(&json!({"category": "fruits"}), 1).unwrap();
    index.add(&json!({"category": "vegetables"}), 2).unwrap();

    assert_eq!(positions(&index, json!({"category": "fruits"}), 3), vec![0, 1]);
    assert_eq!(positions(&index, json!({"category": "vegetables"}), 3), vec![2]);
    assert!(positions(&index, json!({"category": "meat"}), 3).is_empty());
}

// =============================================================================
// Term-mapped arrays
// =============================================================================

#[test]
fn test_term_mapped_tags() {
    let mut index = tags_index();
    index.add(&json!({"tags": ["a", "b"]}), 0).unwrap();
    index.add(&json!({"tags": ["b", "c"]}), 1).unwrap();

    assert_eq!(positions(&index, json!({"tags": {"$all": ["a", "b"]}}), 2), vec![0]);
    assert_eq!(positions(&index, json!({"tags": {"$in": ["c"]}}), 2), vec![1]);
    assert_eq!(positions(&index, json!({"tags": "b"}), 2), vec![0, 1]);

    // keys are term ids, not the strings themselves
    let id = index.terms().peek_id("a").unwrap();
    assert!(index.postings("tags", &id.to_string()).is_some());
    assert!(index.postings("tags", "a").is_none());
}

#[test]
fn test_unknown_term_matches_nothing_and_is_not_interned() {
    let mut index = tags_index();
    index.add(&json!({"tags": ["a"]}), 0).unwrap();
    let before = index.terms().len();

    assert!(positions(&index, json!({"tags": "zzz"}), 1).is_empty());
    assert!(positions(&index, json!({"tags": {"$all": ["a", "zzz"]}}), 1).is_empty());
    assert_eq!(index.terms().len(), before);
}

// =============================================================================
// Posting list compaction
// =============================================================================

#[test]
fn test_compaction_boundary() {
    let config = PostingConfig {
        range_threshold: 10,
        compaction_factor: 3,
        ..PostingConfig::default()
    };
    let mut list = PostingList::new(config);

    for p in 0..25 {
        list.add(p);
    }
    assert!(list.ranges().is_empty());
    assert!(list.contains(12));

    list.add(25);
    assert!(list.ranges().is_empty());
    assert_eq!(list.explicit_len(), 26);

    for p in 26..30 {
        list.add(p);
    }
    assert_eq!(list.ranges().len(), 1);
    assert_eq!(list.explicit_len(), 0);
    assert!((0..30).all(|p| list.contains(p)));
    assert!(!list.contains(30));
    assert_eq!(list.len(), 30);
}

// =============================================================================
// Complements
// =============================================================================

#[test]
fn test_and_with_negated_in() {
    let mut index = tags_index();
    index.add(&json!({"tags": ["a", "b"]}), 0).unwrap();
    index.add(&json!({"tags": ["b", "c"]}), 1).unwrap();

    let criteria = json!({"$and": [
        {"tags": {"$in": ["a"]}},
        {"$not": {"tags": {"$in": ["b"]}}}
    ]});
    assert!(positions(&index, criteria.clone(), 2).is_empty());

    index.add(&json!({"tags": ["a"]}), 2).unwrap();
    assert_eq!(positions(&index, criteria, 3), vec![2]);
}

#[test]
fn test_complement_through_planner_matches_streaming() {
    let store = MemoryRecords::from_records(vec![
        json!({"tags": ["a", "b"]}),
        json!({"tags": ["b", "c"]}),
        json!({"tags": ["a"]}),
        json!({"other": true}),
    ]);
    let mut index = tags_index();
    index.rebuild(store.records()).unwrap();

    let criteria = Criteria::parse(&json!({"tags": {"$nin": ["b"]}})).unwrap();
    let mut planner = QueryPlanner::new(&mut index, &store);
    let result = planner.find(&criteria, &QueryOptions::default()).unwrap();
    assert_eq!(result.strategy, Strategy::Indexed);
    assert_eq!(result.positions(), vec![2, 3]);
}

// =============================================================================
// Orphan cleanup
// =============================================================================

#[test]
fn test_orphan_cleanup_policy() {
    let mut terms = TermDictionary::new();
    let ids: Vec<_> = (0..10).map(|i| terms.get_or_create_id(&format!("t{i}"))).collect();
    for &id in &ids[..3] {
        terms.release(id);
    }
    assert_eq!(terms.orphan_count(), 3);

    assert_eq!(terms.cleanup_orphans(false), 0);
    assert_eq!(terms.len(), 10);

    assert_eq!(terms.cleanup_orphans(true), 3);
    assert_eq!(terms.len(), 7);
    assert!(terms.peek_id("t0").is_none());
    assert_eq!(terms.peek_id("t5"), Some(ids[5]));
}
