//! Query executor
//!
//! Executes one candidate pass against the record source.
//!
//! Execution flow (strict order):
//! 1. Enumerate candidates: every record, or the positions from the index
//! 2. Resolve each position to its record (empty slots are skipped)
//! 3. Filter with the residual criteria, if any
//! 4. Apply sort (if specified)
//! 5. Apply skip and limit
//!
//! Without a sort, enumeration stops once enough matches are collected.

use std::borrow::Cow;

use serde_json::Value;
use tracing::trace;

use crate::criteria::Criteria;
use crate::index::PositionSet;
use crate::planner::QueryOptions;
use crate::storage::{Position, RecordSource};

use super::filters::{CriteriaEvaluator, MatchOptions};
use super::result::{ExecutionResult, ResultRecord};
use super::sorter::ResultSorter;

/// Records to evaluate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// Stream every record
    All,
    /// Only these positions, in ascending order
    Positions(PositionSet),
}

impl Candidates {
    /// Number of candidate positions, if known
    pub fn len(&self) -> Option<usize> {
        match self {
            Candidates::All => None,
            Candidates::Positions(p) => Some(p.len()),
        }
    }

    /// Returns true if there are known to be no candidates
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

/// Query executor over a record source
pub struct QueryExecutor<'a, S: RecordSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: RecordSource + ?Sized> QueryExecutor<'a, S> {
    /// Creates a new executor
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Executes one pass.
    ///
    /// `filter` is the part of the criteria the candidates do not already
    /// guarantee; None means every candidate matches.
    pub fn execute(
        &self,
        candidates: &Candidates,
        filter: Option<&Criteria>,
        options: &QueryOptions,
    ) -> ExecutionResult {
        match candidates {
            Candidates::All => self.run(self.source.records(), filter, options),
            Candidates::Positions(positions) => {
                let resolved = positions
                    .iter()
                    .filter_map(|&p| self.source.record_at(p).map(|r| (p, r)));
                self.run(resolved, filter, options)
            }
        }
    }

    fn run<'r, I>(&self, records: I, filter: Option<&Criteria>, options: &QueryOptions) -> ExecutionResult
    where
        I: Iterator<Item = (Position, Cow<'r, Value>)>,
    {
        let match_options = MatchOptions {
            case_insensitive: options.case_insensitive,
        };
        // one extra match tells us whether the limit cut anything off
        let stop_after = match options.limit {
            Some(limit) if options.order_by.is_empty() => Some(options.skip + limit + 1),
            _ => None,
        };

        let mut matched = Vec::new();
        let mut scanned_count = 0;
        for (position, record) in records {
            scanned_count += 1;
            if let Some(criteria) = filter {
                if !CriteriaEvaluator::matches_with(&record, criteria, match_options) {
                    continue;
                }
            }
            matched.push(ResultRecord::new(position, record.into_owned()));
            if stop_after.is_some_and(|n| matched.len() >= n) {
                trace!(scanned_count, "stopped early at limit");
                break;
            }
        }

        if !options.order_by.is_empty() {
            ResultSorter::sort(&mut matched, &options.order_by);
        }

        let total_matched = matched.len();
        let records: Vec<ResultRecord> = matched
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        ExecutionResult {
            limit_applied: records.len() < total_matched,
            records,
            scanned_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SortSpec;
    use crate::storage::MemoryRecords;
    use serde_json::json;

    fn store() -> MemoryRecords {
        let mut store = MemoryRecords::new();
        for age in [40, 15, 33, 27, 61] {
            store.push(json!({"age": age}));
        }
        store.delete(2);
        store
    }

    fn positions(result: &ExecutionResult) -> Vec<Position> {
        result.records.iter().map(|r| r.position).collect()
    }

    #[test]
    fn test_stream_all_with_filter() {
        let store = store();
        let criteria = Criteria::parse(&json!({"age": {"$gt": 20}})).unwrap();
        let result = QueryExecutor::new(&store).execute(
            &Candidates::All,
            Some(&criteria),
            &QueryOptions::default(),
        );
        assert_eq!(positions(&result), vec![0, 3, 4]);
        assert_eq!(result.scanned_count, 4);
        assert!(!result.limit_applied);
    }

    #[test]
    fn test_positions_skip_empty_slots() {
        let store = store();
        let candidates = Candidates::Positions([1, 2, 4, 9].into_iter().collect());
        let result = QueryExecutor::new(&store).execute(&candidates, None, &QueryOptions::default());
        assert_eq!(positions(&result), vec![1, 4]);
        assert_eq!(result.scanned_count, 2);
    }

    #[test]
    fn test_limit_stops_early_without_sort() {
        let store = store();
        let options = QueryOptions::default().with_limit(1).with_skip(1);
        let result = QueryExecutor::new(&store).execute(&Candidates::All, None, &options);
        assert_eq!(positions(&result), vec![1]);
        assert_eq!(result.scanned_count, 3);
        assert!(result.limit_applied);
    }

    #[test]
    fn test_sort_before_limit() {
        let store = store();
        let options = QueryOptions::default()
            .with_limit(2)
            .with_order_by(vec![SortSpec::desc("age")]);
        let result = QueryExecutor::new(&store).execute(&Candidates::All, None, &options);
        assert_eq!(positions(&result), vec![4, 0]);
        assert_eq!(result.scanned_count, 4);
        assert!(result.limit_applied);
    }
}
