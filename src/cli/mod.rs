//! CLI module for lineindex
//!
//! Provides command-line interface for:
//! - query: run one query over a JSON-lines file
//! - explain: show the plan for one query
//! - stats: build the index and report per-field statistics

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QueryArgs, SourceArgs};
pub use commands::{explain, query, run, run_command, stats};
pub use errors::{CliError, CliResult};
pub use io::{load_records, read_criteria, write_error, write_response};
