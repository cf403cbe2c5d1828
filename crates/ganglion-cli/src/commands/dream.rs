//! `ganglion dream` — off-session consolidation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use ganglion_core::dream::{DreamRunOptions, run_dream_cycle};
use ganglion_core::ProjectPaths;

#[derive(Args)]
pub struct DreamArgs {
    /// Start date (YYYY-MM-DD) or 'auto' to resume from the last dream
    #[arg(long)]
    since: Option<String>,

    /// Focus one agent
    #[arg(long)]
    agent: Option<String>,

    /// Validate insights against the collected sources
    #[arg(long)]
    validate: bool,

    /// Render without writing journal, memory or stamp
    #[arg(long)]
    dry_run: bool,

    /// JSON output
    #[arg(long)]
    json: bool,

    /// Quick mode: linear passes only (patterns + opportunities)
    #[arg(long)]
    quick: bool,

    /// Emit surviving insights as pheromones
    #[arg(long)]
    emit: bool,
}

pub fn run(paths: &ProjectPaths, args: DreamArgs) -> Result<i32> {
    let options = DreamRunOptions {
        since: args.since,
        agent: args.agent,
        validate: args.validate,
        quick: args.quick,
        dry_run: args.dry_run,
        emit: args.emit,
    };

    let outcome = run_dream_cycle(paths, &options)?;

    if outcome.sources.is_empty() {
        println!("💤 No memory source found — nothing to dream about.");
        return Ok(0);
    }

    let mode = if args.quick { "Quick" } else { "Dream" };
    println!(
        "🌙 {} Mode — {} sources, {} entries",
        mode.bold(),
        outcome.sources.len(),
        outcome.total_entries()
    );
    if let Some(since) = &outcome.since {
        println!("   Since: {}", since);
    }
    println!();

    if outcome.insights.is_empty() {
        println!("😴 No emergent insight detected. The system is coherent.");
        return Ok(0);
    }

    if let Some(diff) = &outcome.diff {
        if !diff.persistent.is_empty() {
            println!("🔁 {} persistent insight(s) (confidence boosted)", diff.persistent.len());
        }
        if !diff.new.is_empty() {
            println!("🆕 {} new insight(s)", diff.new.len());
        }
        if !diff.resolved.is_empty() {
            println!("✅ {} resolved insight(s) (no longer appearing)", diff.resolved.len());
        }
        if !diff.is_empty() {
            println!();
        }
    }

    if outcome.emitted > 0 {
        println!("🐜 {} insight(s) emitted as pheromones", outcome.emitted);
        println!();
    }

    if args.json {
        let data: Vec<_> = outcome
            .insights
            .iter()
            .map(|i| {
                json!({
                    "title": i.title,
                    "description": i.description,
                    "sources": i.sources,
                    "category": i.category,
                    "confidence": i.confidence,
                    "actionable": i.actionable,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if args.dry_run {
        if let Some(journal) = &outcome.journal {
            println!("{}", journal);
        }
        return Ok(0);
    }

    if let Some(path) = &outcome.journal_path {
        println!(
            "{}",
            format!("✅ {} insights written to {}", outcome.insights.len(), path.display()).green()
        );
        println!();
    }
    for (index, insight) in outcome.insights.iter().take(5).enumerate() {
        println!(
            "  {} {}. {} ({:.0}%)",
            insight.category.icon(),
            index + 1,
            insight.title,
            insight.confidence * 100.0
        );
    }
    if outcome.insights.len() > 5 {
        println!("  ... and {} more in the journal", outcome.insights.len() - 5);
    }

    Ok(0)
}
