//! `ganglion run` — the full nervous-system cycle.

use anyhow::Result;
use clap::Args;

use ganglion_core::orchestrator::{self, RunOptions};
use ganglion_core::ProjectPaths;

#[derive(Args)]
pub struct RunArgs {
    /// Start date (YYYY-MM-DD) or 'auto' for since the last dream
    #[arg(long)]
    since: Option<String>,

    /// Quick mode (linear dream passes only)
    #[arg(long)]
    quick: bool,

    /// Unified JSON output
    #[arg(long)]
    json: bool,

    /// Let dream and lint publish pheromones
    #[arg(long)]
    emit: bool,
}

pub fn run(paths: &ProjectPaths, args: RunArgs) -> Result<i32> {
    let options = RunOptions {
        since: args.since,
        quick: args.quick,
        emit: args.emit,
    };
    let report = orchestrator::run(paths, &options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&orchestrator::report_to_json(&report))?);
    } else {
        println!("{}", orchestrator::render_report(&report));
    }

    Ok(if report.error_count() > 0 { 1 } else { 0 })
}
