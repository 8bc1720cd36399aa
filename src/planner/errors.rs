//! Planner error types
//!
//! Error codes:
//! - LINEINDEX_QUERY_INVALID_CRITERIA
//! - LINEINDEX_QUERY_INVALID_OPTIONS
//!
//! Unindexable criteria and missing index data are not errors: the planner
//! falls back to streaming.

use thiserror::Error;

use crate::criteria::CriteriaError;

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Planner errors
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Criteria input is malformed
    #[error("invalid criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),

    /// Query options are malformed
    #[error("invalid query options: {0}")]
    InvalidOptions(String),
}

impl PlannerError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerError::InvalidCriteria(_) => "LINEINDEX_QUERY_INVALID_CRITERIA",
            PlannerError::InvalidOptions(_) => "LINEINDEX_QUERY_INVALID_OPTIONS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criteria;
    use serde_json::json;

    #[test]
    fn test_criteria_error_converts() {
        let err: PlannerError = Criteria::parse(&json!(5)).unwrap_err().into();
        assert_eq!(err.code(), "LINEINDEX_QUERY_INVALID_CRITERIA");
        assert!(err.to_string().contains("must be an object"));
    }
}
