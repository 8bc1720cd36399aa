//! Index error types
//!
//! Error codes:
//! - LINEINDEX_INVALID_RECORD
//! - LINEINDEX_MISSING_RECORD_ID
//! - LINEINDEX_INVALID_TERM_IDS
//! - LINEINDEX_INVALID_PERSISTED_INDEX
//! - LINEINDEX_INDEX_CONFIG
//!
//! Unsupported predicates and missing index data are not errors; they are
//! reported through `Lookup::CannotIndex` and `IndexHealth`.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Index errors. All of them describe invalid caller input.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Record passed to add/remove is not a JSON object
    #[error("record must be a JSON object, got {found}")]
    InvalidRecord { found: &'static str },

    /// Remove needs the record id to confirm ownership of positions
    #[error("record has no '{id_field}' value; cannot confirm which positions it owns")]
    MissingRecordId { id_field: String },

    /// `<field>Ids` side-channel is present but malformed
    #[error("'{field}Ids' must be an array of non-negative integers: {reason}")]
    InvalidTermIds { field: String, reason: String },

    /// Persisted index does not have the expected shape
    #[error("persisted index is malformed: {0}")]
    InvalidPersisted(String),

    /// Index configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IndexError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidRecord { .. } => "LINEINDEX_INVALID_RECORD",
            IndexError::MissingRecordId { .. } => "LINEINDEX_MISSING_RECORD_ID",
            IndexError::InvalidTermIds { .. } => "LINEINDEX_INVALID_TERM_IDS",
            IndexError::InvalidPersisted(_) => "LINEINDEX_INVALID_PERSISTED_INDEX",
            IndexError::Config(_) => "LINEINDEX_INDEX_CONFIG",
        }
    }

    pub(crate) fn invalid_record(value: &serde_json::Value) -> Self {
        IndexError::InvalidRecord {
            found: json_type_name(value),
        }
    }
}

/// JSON type name for error messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
