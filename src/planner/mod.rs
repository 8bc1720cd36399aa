//! Query planner subsystem
//!
//! Decides per query whether posting lists or a full scan answers it, and
//! guarantees both paths return the same records.
//!
//! # Design Principles
//!
//! - Deterministic: same index, records and options give the same plan
//! - Exact: the Indexed strategy never returns a record the evaluator rejects
//! - Self-healing: empty indexed results backed by unindexed data trigger
//!   one rebuild, or a fall back to streaming
//!
//! # Strategy Selection (strict order)
//!
//! 1. Empty criteria, regex, or unindexable parts: Streaming
//! 2. Unselective estimate on a large enough source: Streaming
//! 3. Otherwise: Indexed
//!
//! Error codes:
//! - LINEINDEX_QUERY_INVALID_CRITERIA
//! - LINEINDEX_QUERY_INVALID_OPTIONS

mod errors;
mod explain;
mod options;
mod planner;

pub use errors::{PlannerError, PlannerResult};
pub use explain::ExplainPlan;
pub use options::{QueryOptions, SortDirection, SortSpec};
pub use planner::{QueryPlanner, QueryResult, Strategy, StrategyDecision, StrategyReason};
