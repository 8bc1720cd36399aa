//! Criteria evaluation against a single record
//!
//! The evaluator defines what a criteria means. Index lookups must agree
//! with it on every record.
//!
//! Field values are read element-wise: an array contributes its elements,
//! a scalar counts as a one-element array, a missing field has none.

use std::cmp::Ordering;

use serde_json::Value;

use crate::criteria::{CmpOp, Criteria, Predicate};
use crate::index::compare_numbers;

/// Evaluation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare strings ignoring case for equality-style operators
    pub case_insensitive: bool,
}

/// Evaluates criteria against records
pub struct CriteriaEvaluator;

impl CriteriaEvaluator {
    /// Checks if a record matches the criteria
    pub fn matches(record: &Value, criteria: &Criteria) -> bool {
        Self::matches_with(record, criteria, MatchOptions::default())
    }

    /// Checks if a record matches the criteria with explicit options
    pub fn matches_with(record: &Value, criteria: &Criteria, options: MatchOptions) -> bool {
        match criteria {
            Criteria::And(branches) => branches
                .iter()
                .all(|b| Self::matches_with(record, b, options)),
            Criteria::Or(branches) => branches
                .iter()
                .any(|b| Self::matches_with(record, b, options)),
            Criteria::Not(inner) => !Self::matches_with(record, inner, options),
            Criteria::Field(fp) => {
                Self::matches_predicate(record.get(&fp.field), &fp.predicate, options)
            }
        }
    }

    /// Checks a field value against one predicate
    fn matches_predicate(value: Option<&Value>, predicate: &Predicate, options: MatchOptions) -> bool {
        let ci = options.case_insensitive;
        match predicate {
            Predicate::Eq(expected) | Predicate::Contains(expected) => {
                Self::eq_match(value, expected, ci)
            }
            Predicate::In(candidates) => candidates.iter().any(|c| Self::eq_match(value, c, ci)),
            Predicate::Nin(candidates) => !candidates.iter().any(|c| Self::eq_match(value, c, ci)),
            Predicate::All(required) => required.iter().all(|r| Self::eq_match(value, r, ci)),
            Predicate::Cmp(CmpOp::Ne, expected) => !Self::eq_match(value, expected, ci),
            Predicate::Cmp(op, bound) => Self::elements(value)
                .iter()
                .any(|e| Self::cmp_match(e, *op, bound)),
            Predicate::Regex(pattern) => Self::elements(value)
                .iter()
                .any(|e| e.as_str().is_some_and(|s| pattern.is_match(s))),
            Predicate::Size(n) => value
                .and_then(Value::as_array)
                .is_some_and(|items| items.len() == *n),
            Predicate::Exists(expected) => value.is_some() == *expected,
            Predicate::Not(inner) => !Self::matches_predicate(value, inner, options),
        }
    }

    /// Element-wise equality.
    ///
    /// An array operand also matches a field holding exactly that array,
    /// and a null operand matches a missing field.
    fn eq_match(value: Option<&Value>, expected: &Value, ci: bool) -> bool {
        match (value, expected) {
            (None, Value::Null) => true,
            (Some(actual), Value::Array(_)) if actual == expected => true,
            _ => Self::elements(value)
                .iter()
                .any(|e| Self::scalar_eq(e, expected, ci)),
        }
    }

    /// Equality without type coercion. Numbers compare by value,
    /// strings optionally ignoring case.
    fn scalar_eq(actual: &Value, expected: &Value, ci: bool) -> bool {
        match (actual, expected) {
            (Value::Number(a), Value::Number(b)) => {
                compare_numbers(a, b) == Some(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) if ci => a.to_lowercase() == b.to_lowercase(),
            _ => actual == expected,
        }
    }

    /// Ordering comparison between numbers or between strings
    fn cmp_match(actual: &Value, op: CmpOp, bound: &Value) -> bool {
        let ordering = match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        };
        ordering.is_some_and(|o| op.holds(o))
    }

    fn elements(value: Option<&Value>) -> &[Value] {
        match value {
            None => &[],
            Some(Value::Array(items)) => items,
            Some(v) => std::slice::from_ref(v),
        }
    }
}
