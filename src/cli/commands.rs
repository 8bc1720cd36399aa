//! CLI command implementations
//!
//! Every command follows the same sequence:
//! 1. Load and validate configuration
//! 2. Load records from the JSON-lines file
//! 3. Build the field index from the records
//! 4. Run the command and write one JSON response to stdout

use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::config::{PlannerConfig, StoreConfig};
use crate::criteria::Criteria;
use crate::index::FieldIndex;
use crate::planner::{QueryOptions, QueryPlanner, SortSpec};
use crate::storage::{MemoryRecords, RecordSource};

use super::args::{Command, QueryArgs, SourceArgs};
use super::errors::{CliError, CliResult};
use super::io::{load_records, read_criteria, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Query(args) => query(&args)?,
        Command::Explain(args) => explain(&args)?,
        Command::Stats(args) => stats(&args)?,
    };
    write_response(data)
}

/// Loaded records with an index built over them
struct Workspace {
    config: StoreConfig,
    records: MemoryRecords,
    index: FieldIndex,
}

fn open(source: &SourceArgs) -> CliResult<Workspace> {
    let config = load_config(&source.config)?;
    let records = load_records(&source.data)?;
    let mut index = FieldIndex::new(config.index.clone())?;
    let indexed = index.rebuild(records.records())?;
    info!(records = indexed, "index built");
    Ok(Workspace {
        config,
        records,
        index,
    })
}

fn load_config(path: &Path) -> CliResult<StoreConfig> {
    Ok(StoreConfig::load(path)?)
}

fn query_options(args: &QueryArgs) -> CliResult<QueryOptions> {
    let order_by = args
        .order_by
        .iter()
        .map(|s| s.parse::<SortSpec>())
        .collect::<Result<Vec<_>, _>>()?;
    let mut options = QueryOptions::default()
        .with_skip(args.skip)
        .with_order_by(order_by)
        .case_insensitive(args.case_insensitive);
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    Ok(options)
}

fn planner_config(config: &StoreConfig, args: &QueryArgs) -> PlannerConfig {
    let hybrid = args.hybrid || config.planner.hybrid_prefilter;
    config.planner.with_hybrid_prefilter(hybrid)
}

fn parse_criteria(args: &QueryArgs) -> CliResult<Criteria> {
    let value = read_criteria(args.criteria.as_deref())?;
    Criteria::parse(&value).map_err(|e| CliError::Query(e.into()))
}

/// Execute a single query
pub fn query(args: &QueryArgs) -> CliResult<Value> {
    let criteria = parse_criteria(args)?;
    let options = query_options(args)?;
    let Workspace {
        config,
        records,
        mut index,
    } = open(&args.source)?;

    let planner_config = planner_config(&config, args);
    let mut planner = QueryPlanner::with_config(&mut index, &records, planner_config);
    let result = planner.find(&criteria, &options)?;

    Ok(serde_json::to_value(&result)?)
}

/// Explain a single query
pub fn explain(args: &QueryArgs) -> CliResult<Value> {
    let criteria = parse_criteria(args)?;
    let options = query_options(args)?;
    let Workspace {
        config,
        records,
        mut index,
    } = open(&args.source)?;

    let planner_config = planner_config(&config, args);
    let planner = QueryPlanner::with_config(&mut index, &records, planner_config);
    let plan = planner.explain(&criteria, &options)?;
    info!("\n{}", plan);

    Ok(serde_json::to_value(&plan)?)
}

/// Build the index and report statistics
pub fn stats(source: &SourceArgs) -> CliResult<Value> {
    let workspace = open(source)?;
    Ok(json!({
        "positions": workspace.records.total_positions(),
        "live_records": workspace.records.live_count(),
        "index": workspace.index.stats(),
    }))
}
