//! Explain plan output
//!
//! Produces deterministic, human-readable explain output for a query
//! without running it.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::criteria::Criteria;
use crate::storage::Position;

use super::options::{QueryOptions, SortSpec};
use super::planner::{Split, Strategy, StrategyDecision};

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainPlan {
    /// Chosen strategy
    pub strategy: Strategy,
    /// Why the strategy was chosen
    pub reason: String,
    /// Criteria as given
    pub criteria: Value,
    /// Part answered from posting lists
    pub indexed: Option<Value>,
    /// Part evaluated record by record
    pub residual: Option<Value>,
    /// Indexed fields the criteria touches
    pub indexed_fields: Vec<String>,
    /// Estimated candidates from the index
    pub estimate: Option<u64>,
    /// Logical positions in the source
    pub total_positions: Position,
    pub skip: usize,
    pub limit: Option<usize>,
    pub order_by: Vec<SortSpec>,
    pub case_insensitive: bool,
}

impl ExplainPlan {
    pub(crate) fn new(
        criteria: &Criteria,
        decision: &StrategyDecision,
        split: &Split,
        total_positions: Position,
        options: &QueryOptions,
    ) -> Self {
        let indexed_fields = split
            .indexed
            .as_ref()
            .map(|c| c.fields().into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            strategy: decision.strategy,
            reason: decision.reason.to_string(),
            criteria: criteria.to_value(),
            indexed: split.indexed.as_ref().map(Criteria::to_value),
            residual: split.residual.as_ref().map(Criteria::to_value),
            indexed_fields,
            estimate: decision.estimate,
            total_positions,
            skip: options.skip,
            limit: options.limit,
            order_by: options.order_by.clone(),
            case_insensitive: options.case_insensitive,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Strategy: {}", self.strategy.as_str().to_uppercase())?;
        writeln!(f, "Reason: {}", self.reason)?;
        writeln!(f, "Criteria: {}", self.criteria)?;

        if !self.indexed_fields.is_empty() {
            writeln!(f, "Indexed Fields:")?;
            for field in &self.indexed_fields {
                writeln!(f, "  - {}", field)?;
            }
        }
        if let Some(residual) = &self.residual {
            writeln!(f, "Residual Filter: {}", residual)?;
        }
        if let Some(estimate) = self.estimate {
            writeln!(
                f,
                "Estimate: {} of {} positions",
                estimate, self.total_positions
            )?;
        }
        if !self.order_by.is_empty() {
            let sort: Vec<String> = self
                .order_by
                .iter()
                .map(|s| format!("{} {}", s.field, s.direction.as_str()))
                .collect();
            writeln!(f, "Sort: {}", sort.join(", "))?;
        }
        if self.skip > 0 {
            writeln!(f, "Skip: {}", self.skip)?;
        }
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: {}", limit)?;
        }
        if self.case_insensitive {
            writeln!(f, "Case Insensitive: yes")?;
        }

        Ok(())
    }
}
