//! CLI-specific error types
//!
//! All CLI errors are fatal: the process prints the error and exits non-zero.
//! Subsystem errors keep their own codes.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::index::IndexError;
use crate::planner::PlannerError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] PlannerError),

    /// A data file line is not valid JSON
    #[error("{path}:{line}: {reason}")]
    Data {
        path: String,
        line: usize,
        reason: String,
    },

    /// Criteria text is not valid JSON
    #[error("criteria is not valid JSON: {0}")]
    CriteriaJson(#[source] serde_json::Error),

    /// No criteria given on the command line or stdin
    #[error("empty input")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(e) => e.code(),
            CliError::Index(e) => e.code(),
            CliError::Query(e) => e.code(),
            CliError::Data { .. } => "LINEINDEX_CLI_DATA",
            CliError::CriteriaJson(_) | CliError::EmptyInput => "LINEINDEX_CLI_INPUT",
            CliError::Io(_) | CliError::Output(_) => "LINEINDEX_CLI_IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: CliError = ConfigError::Invalid("bad".into()).into();
        assert_eq!(err.code(), "LINEINDEX_CONFIG_INVALID");
        assert_eq!(err.to_string(), ConfigError::Invalid("bad".into()).to_string());

        let err = CliError::Data {
            path: "a.jsonl".into(),
            line: 3,
            reason: "expected value".into(),
        };
        assert_eq!(err.code(), "LINEINDEX_CLI_DATA");
        assert_eq!(err.to_string(), "a.jsonl:3: expected value");
    }
}
