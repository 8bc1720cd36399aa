//! Query executor subsystem
//!
//! Evaluates criteria against records and produces ordered results.
//!
//! # Execution Flow (strict order)
//!
//! 1. Enumerate candidate positions (index) or every record (stream)
//! 2. Resolve positions to records through the storage collaborator
//! 3. Filter with `CriteriaEvaluator`
//! 4. Apply sort (if specified)
//! 5. Apply skip and limit
//!
//! # Invariants
//!
//! - `CriteriaEvaluator` is the reference semantics for every operator
//! - Deterministic: ties in sort order break by position

mod executor;
mod filters;
mod result;
mod sorter;

pub use executor::{Candidates, QueryExecutor};
pub use filters::{CriteriaEvaluator, MatchOptions};
pub use result::{ExecutionResult, ResultRecord};
pub use sorter::ResultSorter;
