//! Result types for query execution

use serde::Serialize;
use serde_json::Value;

use crate::storage::Position;

/// A single record in the result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// Logical position the record was read from
    pub position: Position,
    /// Record body
    pub record: Value,
}

impl ResultRecord {
    /// Creates a result record
    pub fn new(position: Position, record: Value) -> Self {
        Self { position, record }
    }
}

/// Result of executing one candidate pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Records in result order
    pub records: Vec<ResultRecord>,
    /// Number of records evaluated
    pub scanned_count: usize,
    /// Whether skip or limit dropped matching records
    pub limit_applied: bool,
}

impl ExecutionResult {
    /// Number of records returned
    pub fn returned_count(&self) -> usize {
        self.records.len()
    }
}
