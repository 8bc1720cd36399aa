//! Result ordering
//!
//! Sorts by one or more fields, deterministically. Ties fall back to the
//! logical position.

use std::cmp::Ordering;

use serde_json::Value;

use super::result::ResultRecord;
use crate::index::compare_numbers;
use crate::planner::{SortDirection, SortSpec};

/// Sorts result records
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records by each spec in turn, then by position
    pub fn sort(records: &mut [ResultRecord], order_by: &[SortSpec]) {
        records.sort_by(|a, b| {
            order_by
                .iter()
                .map(|spec| {
                    let ordering =
                        Self::compare_values(a.record.get(&spec.field), b.record.get(&spec.field));
                    match spec.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.position.cmp(&b.position))
        });
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing < null < bool < number < string < array < object
    /// - For same types, natural ordering; arrays and objects compare equal
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let type_order = |v: &Value| -> u8 {
                    match v {
                        Value::Null => 0,
                        Value::Bool(_) => 1,
                        Value::Number(_) => 2,
                        Value::String(_) => 3,
                        Value::Array(_) => 4,
                        Value::Object(_) => 5,
                    }
                };

                let a_type = type_order(a_val);
                let b_type = type_order(b_val);
                if a_type != b_type {
                    return a_type.cmp(&b_type);
                }

                match (a_val, b_val) {
                    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                    (Value::Number(x), Value::Number(y)) => {
                        compare_numbers(x, y).unwrap_or(Ordering::Equal)
                    }
                    (Value::String(x), Value::String(y)) => x.cmp(y),
                    _ => Ordering::Equal,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(position: u64, record: Value) -> ResultRecord {
        ResultRecord::new(position, record)
    }

    fn positions(records: &[ResultRecord]) -> Vec<u64> {
        records.iter().map(|r| r.position).collect()
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut records = vec![
            rec(0, json!({"age": 30})),
            rec(1, json!({"age": 20})),
            rec(2, json!({"age": 25})),
        ];
        ResultSorter::sort(&mut records, &[SortSpec::asc("age")]);
        assert_eq!(positions(&records), vec![1, 2, 0]);

        ResultSorter::sort(&mut records, &[SortSpec::desc("age")]);
        assert_eq!(positions(&records), vec![0, 2, 1]);
    }

    #[test]
    fn test_ties_break_by_next_spec_then_position() {
        let mut records = vec![
            rec(3, json!({"group": "b", "name": "x"})),
            rec(1, json!({"group": "a", "name": "z"})),
            rec(2, json!({"group": "a", "name": "y"})),
            rec(0, json!({"group": "b", "name": "x"})),
        ];
        ResultSorter::sort(&mut records, &[SortSpec::asc("group"), SortSpec::asc("name")]);
        assert_eq!(positions(&records), vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_mixed_types_and_missing() {
        let mut records = vec![
            rec(0, json!({"v": "text"})),
            rec(1, json!({})),
            rec(2, json!({"v": 5})),
            rec(3, json!({"v": null})),
            rec(4, json!({"v": true})),
        ];
        ResultSorter::sort(&mut records, &[SortSpec::asc("v")]);
        assert_eq!(positions(&records), vec![1, 3, 4, 2, 0]);
    }
}
