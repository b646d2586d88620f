//! drift CLI: merge many CSV files into a single CSV object.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use drift::{CliArgs, Config, init_tracing, log_outcome, run_merge};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    if args.config.is_empty() {
        eprintln!("Error: no config files specified (use -c <file>)");
        return ExitCode::FAILURE;
    }

    info!("Loading config from {} file(s)", args.config.len());

    let mut config = match Config::from_paths(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply_overrides(&mut config);

    info!("Starting drift CSV merge");
    info!("  Source:   {}", config.source.path);
    if let Some(prefix) = config.source.prefix.as_deref().filter(|p| !p.is_empty()) {
        info!("  Prefix:   {prefix}");
    }
    info!("  Sink:     {}/{}", config.sink.path, config.sink.object_name);
    info!("  Strategy: {}", config.merge.strategy);
    if let Some(column) = config.merge.tag_column() {
        info!("  Tagging rows with column '{column}'");
    }

    match run_merge(&config, args.dry_run).await {
        Ok(outcome) => {
            log_outcome(&config, &outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Merge failed: {e}");
            ExitCode::FAILURE
        }
    }
}
