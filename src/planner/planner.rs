//! Query planner
//!
//! Chooses between answering from posting lists (Indexed) and evaluating
//! every record (Streaming), then drives the executor.
//!
//! Strategy rules (strict order):
//! 1. Empty criteria: Streaming
//! 2. Regular expression anywhere: Streaming
//! 3. Any part not index-resolvable: Streaming
//! 4. Implied result size above `max_index_fraction` of all positions: Streaming
//! 5. Otherwise: Indexed
//!
//! With `hybrid_prefilter`, rules 2 and 3 only apply when no `$and` conjunct
//! is index-resolvable; resolvable conjuncts pre-filter and the rest is
//! evaluated per candidate.
//!
//! `$or` branches are resolved independently and unioned.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::criteria::Criteria;
use crate::executor::{Candidates, ExecutionResult, QueryExecutor, ResultRecord};
use crate::index::{CannotIndex, FieldIndex, IndexHealth, LookupOptions, PositionSet};
use crate::storage::{Position, RecordSource};

use super::errors::PlannerResult;
use super::explain::ExplainPlan;
use super::options::QueryOptions;

/// Execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Candidates come from posting lists
    Indexed,
    /// Every record is evaluated
    Streaming,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Indexed => "indexed",
            Strategy::Streaming => "streaming",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a strategy was chosen
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyReason {
    /// Criteria matches everything
    EmptyCriteria,
    /// Criteria contains a regular expression
    Regex,
    /// Some part cannot be resolved from the index
    NotIndexable(CannotIndex),
    /// The index would return too large a share of all positions
    Unselective { implied: u64, total: u64 },
    /// Fully resolvable from the index
    Indexable,
    /// Resolvable conjuncts pre-filter, the rest is evaluated per record
    Prefiltered,
}

impl fmt::Display for StrategyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyReason::EmptyCriteria => write!(f, "empty criteria"),
            StrategyReason::Regex => write!(f, "regular expressions are evaluated per record"),
            StrategyReason::NotIndexable(c) => write!(f, "{}", c),
            StrategyReason::Unselective { implied, total } => write!(
                f,
                "index would yield ~{} of {} positions",
                implied, total
            ),
            StrategyReason::Indexable => write!(f, "fully index-resolvable"),
            StrategyReason::Prefiltered => write!(f, "index pre-filter with residual criteria"),
        }
    }
}

/// Outcome of strategy selection
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    pub reason: StrategyReason,
    /// Index estimate of the resolvable part, when computed
    pub estimate: Option<u64>,
}

impl StrategyDecision {
    fn streaming(reason: StrategyReason) -> Self {
        Self {
            strategy: Strategy::Streaming,
            reason,
            estimate: None,
        }
    }
}

/// Result of `QueryPlanner::find`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Matching records in result order
    pub records: Vec<ResultRecord>,
    /// Strategy that produced the records
    pub strategy: Strategy,
    /// Records evaluated
    pub scanned_count: usize,
    /// Whether skip or limit dropped matching records
    pub limit_applied: bool,
    /// Whether an index rebuild was requested and performed
    pub rebuilt: bool,
}

impl QueryResult {
    fn from_execution(result: ExecutionResult, strategy: Strategy, rebuilt: bool) -> Self {
        Self {
            records: result.records,
            strategy,
            scanned_count: result.scanned_count,
            limit_applied: result.limit_applied,
            rebuilt,
        }
    }

    /// Record bodies in result order
    pub fn values(&self) -> Vec<&Value> {
        self.records.iter().map(|r| &r.record).collect()
    }

    /// Positions in result order
    pub fn positions(&self) -> Vec<Position> {
        self.records.iter().map(|r| r.position).collect()
    }
}

/// Criteria split into an index-resolvable part and a residual
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Split {
    pub(crate) indexed: Option<Criteria>,
    pub(crate) residual: Option<Criteria>,
}

/// Query planner over one index and its record source.
///
/// Borrows the index mutably so a rebuild can be requested mid-query;
/// callers serialize access.
pub struct QueryPlanner<'a, S: RecordSource + ?Sized> {
    index: &'a mut FieldIndex,
    source: &'a S,
    config: PlannerConfig,
}

impl<'a, S: RecordSource + ?Sized> QueryPlanner<'a, S> {
    /// Creates a planner with default configuration
    pub fn new(index: &'a mut FieldIndex, source: &'a S) -> Self {
        Self::with_config(index, source, PlannerConfig::default())
    }

    /// Creates a planner with explicit configuration
    pub fn with_config(index: &'a mut FieldIndex, source: &'a S, config: PlannerConfig) -> Self {
        Self {
            index,
            source,
            config,
        }
    }

    /// Planner configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Chooses the strategy for a query
    pub fn choose_strategy(&self, criteria: &Criteria, options: &QueryOptions) -> StrategyDecision {
        if criteria.is_empty() {
            return StrategyDecision::streaming(StrategyReason::EmptyCriteria);
        }
        if !self.config.hybrid_prefilter && criteria.contains_regex() {
            return StrategyDecision::streaming(StrategyReason::Regex);
        }

        let split = self.split(criteria);
        let Some(indexed) = &split.indexed else {
            let reason = match self.indexable(criteria) {
                Err(cannot) => StrategyReason::NotIndexable(cannot),
                Ok(()) => StrategyReason::Regex,
            };
            return StrategyDecision::streaming(reason);
        };

        let total = self.source.total_positions();
        let estimate = self.index.estimate(indexed, self.lookup_options(options));
        if let Some(estimate) = estimate {
            let implied = match options.window() {
                Some(window) => estimate.min(window as u64),
                None => estimate,
            };
            if total >= self.config.min_records_for_estimate
                && implied as f64 > self.config.max_index_fraction * total as f64
            {
                return StrategyDecision {
                    strategy: Strategy::Streaming,
                    reason: StrategyReason::Unselective { implied, total },
                    estimate: Some(estimate),
                };
            }
        }

        let reason = if split.residual.is_some() {
            StrategyReason::Prefiltered
        } else {
            StrategyReason::Indexable
        };
        StrategyDecision {
            strategy: Strategy::Indexed,
            reason,
            estimate,
        }
    }

    /// Finds matching records
    pub fn find(&mut self, criteria: &Criteria, options: &QueryOptions) -> PlannerResult<QueryResult> {
        options.validate()?;
        let decision = self.choose_strategy(criteria, options);
        debug!(
            strategy = %decision.strategy,
            reason = %decision.reason,
            estimate = ?decision.estimate,
            "chose query strategy"
        );

        if decision.strategy == Strategy::Streaming {
            return Ok(self.stream(criteria, options));
        }

        let split = self.split(criteria);
        let Some(indexed) = split.indexed else {
            return Ok(self.stream(criteria, options));
        };

        let mut rebuilt = false;
        let mut positions = self.resolve(&indexed, options);
        if positions.is_empty() && self.index_data_missing(&indexed) {
            if !self.config.rebuild_on_missing {
                info!("index data missing; falling back to streaming");
                return Ok(self.stream(criteria, options));
            }
            warn!("index data missing; requesting rebuild");
            if !self.source.rebuild_index(&mut *self.index) {
                info!("rebuild unavailable; falling back to streaming");
                return Ok(self.stream(criteria, options));
            }
            rebuilt = true;
            positions = self.resolve(&indexed, options);
        }

        let executor = QueryExecutor::new(self.source);
        let result = executor.execute(
            &Candidates::Positions(positions),
            split.residual.as_ref(),
            options,
        );
        Ok(QueryResult::from_execution(result, Strategy::Indexed, rebuilt))
    }

    /// Parses caller JSON and finds matching records
    pub fn find_json(&mut self, criteria: &Value, options: &QueryOptions) -> PlannerResult<QueryResult> {
        let criteria = Criteria::parse(criteria)?;
        self.find(&criteria, options)
    }

    /// Describes how a query would run, without running it
    pub fn explain(&self, criteria: &Criteria, options: &QueryOptions) -> PlannerResult<ExplainPlan> {
        options.validate()?;
        let decision = self.choose_strategy(criteria, options);
        let split = match decision.strategy {
            Strategy::Indexed => self.split(criteria),
            Strategy::Streaming => Split {
                indexed: None,
                residual: (!criteria.is_empty()).then(|| criteria.clone()),
            },
        };
        Ok(ExplainPlan::new(
            criteria,
            &decision,
            &split,
            self.source.total_positions(),
            options,
        ))
    }

    fn stream(&self, criteria: &Criteria, options: &QueryOptions) -> QueryResult {
        let filter = (!criteria.is_empty()).then_some(criteria);
        let result = QueryExecutor::new(self.source).execute(&Candidates::All, filter, options);
        QueryResult::from_execution(result, Strategy::Streaming, false)
    }

    fn lookup_options(&self, options: &QueryOptions) -> LookupOptions {
        LookupOptions::new(self.source.total_positions()).case_insensitive(options.case_insensitive)
    }

    /// Whether the whole tree resolves from the index, `$or` included
    fn indexable(&self, criteria: &Criteria) -> Result<(), CannotIndex> {
        match criteria {
            Criteria::Or(branches) | Criteria::And(branches) => {
                branches.iter().try_for_each(|b| self.indexable(b))
            }
            Criteria::Not(_) | Criteria::Field(_) => self.index.supports(criteria),
        }
    }

    pub(crate) fn split(&self, criteria: &Criteria) -> Split {
        if self.indexable(criteria).is_ok() && !criteria.contains_regex() {
            return Split {
                indexed: Some(criteria.clone()),
                residual: None,
            };
        }
        if !self.config.hybrid_prefilter {
            return Split {
                indexed: None,
                residual: Some(criteria.clone()),
            };
        }

        let branches = match criteria {
            Criteria::And(branches) => branches.as_slice(),
            single => std::slice::from_ref(single),
        };
        let (resolvable, rest): (Vec<&Criteria>, Vec<&Criteria>) = branches
            .iter()
            .partition(|b| self.indexable(b).is_ok() && !b.contains_regex());

        Split {
            indexed: conjunction(resolvable),
            residual: conjunction(rest),
        }
    }

    /// Exact positions for an index-resolvable tree
    fn resolve(&self, criteria: &Criteria, options: &QueryOptions) -> PositionSet {
        match criteria {
            Criteria::Or(branches) => branches
                .iter()
                .flat_map(|b| self.resolve(b, options))
                .collect(),
            Criteria::And(branches) if criteria.contains_or() => {
                let mut result: Option<PositionSet> = None;
                for branch in branches {
                    let set = self.resolve(branch, options);
                    result = Some(match result {
                        None => set,
                        Some(acc) => acc.intersection(&set).copied().collect(),
                    });
                }
                result.unwrap_or_else(|| (0..self.source.total_positions()).collect())
            }
            _ => self
                .index
                .query(criteria, self.lookup_options(options))
                .positions()
                .unwrap_or_default(),
        }
    }

    /// Samples records for evidence that the index lacks their values
    fn index_data_missing(&self, criteria: &Criteria) -> bool {
        let fields: BTreeSet<&str> = criteria.fields();
        fields.into_iter().any(|field| {
            let sample = self.source.records().take(self.config.missing_data_sample);
            self.index.verify_sample(field, sample) == Some(IndexHealth::Missing)
        })
    }
}

fn conjunction(branches: Vec<&Criteria>) -> Option<Criteria> {
    match branches.len() {
        0 => None,
        1 => branches.into_iter().next().cloned(),
        _ => Some(Criteria::And(branches.into_iter().cloned().collect())),
    }
}
