//! CLI argument definitions using clap
//!
//! Commands:
//! - lineindex query --data <file.jsonl> --config <path> [--criteria <json>]
//! - lineindex explain --data <file.jsonl> --config <path> [--criteria <json>]
//! - lineindex stats --data <file.jsonl> --config <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// lineindex - field indexes and query planning over JSON-lines records
#[derive(Parser, Debug)]
#[command(name = "lineindex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query and print the matching records
    Query(QueryArgs),

    /// Describe how a query would run without running it
    Explain(QueryArgs),

    /// Build the index and print per-field statistics
    Stats(SourceArgs),
}

/// Where records and configuration come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// JSON-lines file; line number is the logical position
    #[arg(long)]
    pub data: PathBuf,

    /// Path to configuration file
    #[arg(long, default_value = "./lineindex.json")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Criteria as JSON; read from stdin when omitted
    #[arg(long)]
    pub criteria: Option<String>,

    /// Maximum number of records returned
    #[arg(long)]
    pub limit: Option<usize>,

    /// Matching records skipped before the first returned one
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Sort key: `field`, `field:asc`, `field:desc` or `-field` (repeatable)
    #[arg(long = "order-by")]
    pub order_by: Vec<String>,

    /// Compare strings ignoring case
    #[arg(long)]
    pub case_insensitive: bool,

    /// Pre-filter indexable conjuncts even when the rest is not indexable
    #[arg(long)]
    pub hybrid: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_args() {
        let cli = Cli::try_parse_from([
            "lineindex",
            "query",
            "--data",
            "records.jsonl",
            "--criteria",
            r#"{"a": 1}"#,
            "--limit",
            "5",
            "--order-by",
            "-age",
            "--order-by",
            "name",
            "--case-insensitive",
        ])
        .unwrap();

        let Command::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.source.data, PathBuf::from("records.jsonl"));
        assert_eq!(args.source.config, PathBuf::from("./lineindex.json"));
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.order_by, vec!["-age", "name"]);
        assert!(args.case_insensitive);
        assert!(!args.hybrid);
    }

    #[test]
    fn test_data_is_required() {
        assert!(Cli::try_parse_from(["lineindex", "stats"]).is_err());
    }
}
