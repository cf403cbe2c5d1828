//! `ganglion memory-lint` — cross-file consistency checks.

use anyhow::Result;
use clap::Args;

use ganglion_core::lint::{self, lint_memory, render_report, report_to_json};
use ganglion_core::ProjectPaths;

#[derive(Args)]
pub struct LintArgs {
    /// JSON output
    #[arg(long)]
    json: bool,

    /// Show fix suggestions
    #[arg(long)]
    fix: bool,

    /// Publish errors as ALERT pheromones
    #[arg(long)]
    emit: bool,
}

pub fn run(paths: &ProjectPaths, args: LintArgs) -> Result<i32> {
    let report = lint_memory(paths);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_to_json(&report))?);
        return Ok(if report.error_count() > 0 { 1 } else { 0 });
    }

    println!("{}", render_report(&report, args.fix));

    if args.emit && report.error_count() > 0 {
        let emitted = lint::emit_to_stigmergy(&report, paths)?;
        if emitted > 0 {
            println!("🐜 {} error(s) emitted as pheromones", emitted);
        }
    }

    Ok(if report.error_count() > 0 { 1 } else { 0 })
}
