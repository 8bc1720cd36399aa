//! Criteria parse errors
//!
//! Error codes:
//! - LINEINDEX_CRITERIA_NOT_OBJECT
//! - LINEINDEX_CRITERIA_UNKNOWN_OPERATOR
//! - LINEINDEX_CRITERIA_INVALID_OPERAND
//! - LINEINDEX_CRITERIA_MIXED_OPERATORS
//! - LINEINDEX_CRITERIA_INVALID_REGEX

use thiserror::Error;

/// Result type for criteria parsing
pub type CriteriaResult<T> = Result<T, CriteriaError>;

/// Malformed criteria input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CriteriaError {
    /// A criteria node is not a JSON object
    #[error("criteria at {path} must be an object, got {found}")]
    NotAnObject { path: String, found: &'static str },

    /// Operator is not recognized
    #[error("unknown operator '{op}' at {path}")]
    UnknownOperator { path: String, op: String },

    /// Operator received an operand of the wrong shape
    #[error("invalid operand for '{op}' at {path}: {reason}")]
    InvalidOperand {
        path: String,
        op: String,
        reason: String,
    },

    /// Operator keys mixed with plain keys in one field object
    #[error("field '{field}' mixes operators with plain keys")]
    MixedOperators { field: String },

    /// Regular expression failed to compile
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Unsupported `$options` flag
    #[error("unsupported regex option '{0}'")]
    InvalidRegexOption(char),
}

impl CriteriaError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CriteriaError::NotAnObject { .. } => "LINEINDEX_CRITERIA_NOT_OBJECT",
            CriteriaError::UnknownOperator { .. } => "LINEINDEX_CRITERIA_UNKNOWN_OPERATOR",
            CriteriaError::InvalidOperand { .. } => "LINEINDEX_CRITERIA_INVALID_OPERAND",
            CriteriaError::MixedOperators { .. } => "LINEINDEX_CRITERIA_MIXED_OPERATORS",
            CriteriaError::InvalidRegex { .. } | CriteriaError::InvalidRegexOption(_) => {
                "LINEINDEX_CRITERIA_INVALID_REGEX"
            }
        }
    }

    pub(crate) fn operand(path: &str, op: &str, reason: impl Into<String>) -> Self {
        CriteriaError::InvalidOperand {
            path: path.to_string(),
            op: op.to_string(),
            reason: reason.into(),
        }
    }
}
