//! lineindex CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Installs the log subscriber (stderr, filtered by `RUST_LOG`)
//! 2. Dispatches to CLI commands (via cli::run)
//! 3. Reports errors as JSON on stdout
//! 4. Exits with non-zero on failure

use lineindex::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        if cli::write_error(e.code(), &e.to_string()).is_err() {
            eprintln!("{}: {}", e.code(), e);
        }
        std::process::exit(1);
    }
}
