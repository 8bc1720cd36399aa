//! Planner / evaluator agreement
//!
//! For random records and random criteria trees, the planner returns the
//! same positions as evaluating every record, whichever strategy it picks.

use lineindex::config::{IndexConfig, PlannerConfig};
use lineindex::criteria::Criteria;
use lineindex::executor::{Candidates, CriteriaEvaluator, MatchOptions, QueryExecutor};
use lineindex::index::{FieldIndex, FieldKind, Lookup, LookupOptions};
use lineindex::planner::{QueryOptions, QueryPlanner, SortSpec};
use lineindex::storage::{MemoryRecords, RecordSource};
use proptest::prelude::*;
use proptest::sample::select;
use serde_json::{json, Map, Value};

// =============================================================================
// Generators
// =============================================================================

const WORDS: &[&str] = &["a", "b", "c", "A"];
const FIELDS: &[&str] = &["cat", "n", "tags", "note"];
const CMP_OPS: &[&str] = &["$gt", "$gte", "$lt", "$lte"];
const NEGATED_OPS: &[&str] = &["$gt", "$lte"];
const PATTERNS: &[&str] = &["^a", "c$"];

fn obj(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

const FLOATS: &[f64] = &[-0.0, 0.0, 1.0, 2.5, 4.0];

fn number() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (0i64..5).prop_map(|n| json!(n)),
        2 => select(FLOATS).prop_map(|f| json!(f)),
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![select(WORDS).prop_map(|s| json!(s)), number()]
}

fn scalars() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(scalar(), 0..3)
}

fn leaf() -> impl Strategy<Value = Value> {
    let field = || select(FIELDS);
    prop_oneof![
        (field(), scalar()).prop_map(|(f, v)| obj(f, v)),
        (field(), scalars()).prop_map(|(f, vs)| obj(f, obj("$in", Value::Array(vs)))),
        (field(), scalars()).prop_map(|(f, vs)| obj(f, obj("$nin", Value::Array(vs)))),
        (field(), scalars()).prop_map(|(f, vs)| obj(f, obj("$all", Value::Array(vs)))),
        (field(), scalar()).prop_map(|(f, v)| obj(f, obj("$ne", v))),
        (field(), scalar()).prop_map(|(f, v)| obj(f, obj("$contains", v))),
        (field(), select(CMP_OPS), scalar())
            .prop_map(|(f, op, v)| obj(f, obj(op, v))),
        (field(), select(NEGATED_OPS), scalar())
            .prop_map(|(f, op, v)| obj(f, obj("$not", obj(op, v)))),
        (field(), any::<bool>()).prop_map(|(f, b)| obj(f, obj("$exists", json!(b)))),
        (field(), select(PATTERNS)).prop_map(|(f, p)| obj(f, obj("$regex", json!(p)))),
    ]
}

fn criteria() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..4).prop_map(|bs| json!({ "$and": bs })),
            proptest::collection::vec(inner.clone(), 1..4).prop_map(|bs| json!({ "$or": bs })),
            inner.prop_map(|c| json!({ "$not": c })),
        ]
    })
}

fn record() -> impl Strategy<Value = Option<Value>> {
    let cat = prop_oneof![
        3 => select(WORDS).prop_map(|s| Some(json!(s))),
        1 => Just(None::<Value>),
        1 => Just(Some(json!(3))),
    ];
    let n = prop_oneof![
        3 => number().prop_map(Some),
        1 => Just(None::<Value>),
        1 => Just(Some(json!("2"))),
    ];
    let tags = prop_oneof![
        3 => proptest::collection::vec(select(WORDS), 0..4).prop_map(|t| Some(json!(t))),
        1 => select(WORDS).prop_map(|s| Some(json!(s))),
        1 => Just(None::<Value>),
    ];
    let note = proptest::option::of(select(WORDS));

    prop_oneof![
        9 => (cat, n, tags, note).prop_map(|(cat, n, tags, note)| {
            let mut map = Map::new();
            for (key, value) in [("cat", cat), ("n", n), ("tags", tags), ("note", note.map(|s| json!(s)))] {
                if let Some(value) = value {
                    map.insert(key.to_string(), value);
                }
            }
            Some(Value::Object(map))
        }),
        1 => Just(None::<Value>),
    ]
}

// =============================================================================
// Helpers
// =============================================================================

fn build(records: &[Option<Value>]) -> (FieldIndex, MemoryRecords) {
    let mut store = MemoryRecords::new();
    for record in records {
        match record {
            Some(r) => store.push(r.clone()),
            None => store.push_empty(),
        };
    }
    let mut index = FieldIndex::new(
        IndexConfig::new()
            .with_field("cat", FieldKind::String)
            .with_field("n", FieldKind::Number)
            .with_term_mapped_field("tags", FieldKind::StringArray),
    )
    .unwrap();
    index.rebuild(store.records()).unwrap();
    (index, store)
}

fn streamed(store: &MemoryRecords, criteria: &Criteria, ci: bool) -> Vec<u64> {
    let options = MatchOptions {
        case_insensitive: ci,
    };
    store
        .records()
        .filter(|(_, r)| CriteriaEvaluator::matches_with(r, criteria, options))
        .map(|(p, _)| p)
        .collect()
}

fn planned(
    index: &mut FieldIndex,
    store: &MemoryRecords,
    config: PlannerConfig,
    criteria: &Criteria,
    options: &QueryOptions,
) -> Vec<u64> {
    let mut planner = QueryPlanner::with_config(index, store, config);
    let result = planner.find(criteria, options).unwrap();
    result.positions()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_planner_agrees_with_evaluator(
        records in proptest::collection::vec(record(), 0..24),
        raw in criteria(),
        ci in any::<bool>(),
    ) {
        let criteria = Criteria::parse(&raw).unwrap();
        let (mut index, store) = build(&records);
        let expected = streamed(&store, &criteria, ci);
        let options = QueryOptions::default().case_insensitive(ci);

        for config in [
            PlannerConfig::default(),
            PlannerConfig::default().always_prefer_index(),
            PlannerConfig::default().always_prefer_index().with_hybrid_prefilter(true),
        ] {
            let found = planned(&mut index, &store, config, &criteria, &options);
            prop_assert_eq!(&found, &expected, "criteria {}", raw);
        }
    }

    #[test]
    fn prop_index_lookup_is_exact(
        records in proptest::collection::vec(record(), 0..24),
        raw in criteria(),
        ci in any::<bool>(),
    ) {
        let criteria = Criteria::parse(&raw).unwrap();
        let (index, store) = build(&records);
        let options = LookupOptions::new(store.total_positions()).case_insensitive(ci);

        if let Lookup::Positions(set) = index.query(&criteria, options) {
            let live: Vec<u64> = set.into_iter().filter(|&p| store.get(p).is_some()).collect();
            prop_assert_eq!(live, streamed(&store, &criteria, ci), "criteria {}", raw);
        }
    }

    #[test]
    fn prop_paging_agrees(
        records in proptest::collection::vec(record(), 0..24),
        raw in criteria(),
        skip in 0usize..4,
        limit in 1usize..6,
    ) {
        let criteria = Criteria::parse(&raw).unwrap();
        let (mut index, store) = build(&records);
        let options = QueryOptions::default()
            .with_skip(skip)
            .with_limit(limit)
            .with_order_by(vec![SortSpec::desc("n"), SortSpec::asc("cat")]);

        let expected: Vec<u64> = QueryExecutor::new(&store)
            .execute(&Candidates::All, Some(&criteria), &options)
            .records
            .iter()
            .map(|r| r.position)
            .collect();
        let found = planned(
            &mut index,
            &store,
            PlannerConfig::default().always_prefer_index(),
            &criteria,
            &options,
        );
        prop_assert_eq!(found, expected, "criteria {}", raw);
    }
}
