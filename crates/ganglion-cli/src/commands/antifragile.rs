//! `ganglion antifragile` — composite resilience scoring.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use ganglion_core::antifragile::{
    self, AntifragileLevel, compute_antifragile_score, render_report, render_trend,
};
use ganglion_core::ProjectPaths;

#[derive(Args)]
pub struct AntifragileArgs {
    /// Detailed Markdown report
    #[arg(long)]
    detail: bool,

    /// Historical trend
    #[arg(long)]
    trend: bool,

    /// JSON output
    #[arg(long)]
    json: bool,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Do not record the score in the history
    #[arg(long)]
    dry_run: bool,
}

fn score_bar(score: f64) -> String {
    let filled = ((score / 5.0) as usize).min(20);
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

pub fn run(paths: &ProjectPaths, args: AntifragileArgs) -> Result<i32> {
    if args.trend {
        let history = antifragile::load_history(paths);
        println!("{}", render_trend(&history));
        return Ok(0);
    }

    let result = compute_antifragile_score(paths, args.since.as_deref());

    if args.json {
        let dimensions: serde_json::Map<String, serde_json::Value> = result
            .dimensions
            .iter()
            .map(|d| {
                (
                    d.name.to_string(),
                    json!({
                        "score": (d.score * 1000.0).round() / 10.0,
                        "weight": d.weight,
                        "evidence": d.evidence_count,
                        "recommendations": d.recommendations,
                    }),
                )
            })
            .collect();
        let data = json!({
            "score": result.global_score,
            "level": result.level,
            "evidence": result.total_evidence,
            "summary": result.summary,
            "dimensions": dimensions,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if args.detail {
        println!("{}", render_report(&result));
    } else {
        let level_label = match result.level {
            AntifragileLevel::Fragile => result.level.to_string().red().bold(),
            AntifragileLevel::Robust => result.level.to_string().yellow().bold(),
            AntifragileLevel::Antifragile => result.level.to_string().green().bold(),
        };
        println!(
            "{} Anti-Fragility Score: {} {}/100 ({})",
            result.level.icon(),
            score_bar(result.global_score),
            result.global_score,
            level_label
        );
        println!("   {}", result.summary);
        println!();

        let mut dimensions: Vec<_> = result.dimensions.iter().collect();
        dimensions.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        for d in dimensions {
            let icon = if d.score >= 0.6 { "🟢" } else if d.score >= 0.3 { "🟡" } else { "🔴" };
            println!("   {} {}: {:.0}% ({} signals)", icon, d.name, d.score * 100.0, d.evidence_count);
        }

        let top_recommendations: Vec<&String> =
            result.dimensions.iter().flat_map(|d| &d.recommendations).take(3).collect();
        if !top_recommendations.is_empty() {
            println!();
            println!("   🎯 Priority actions:");
            for recommendation in top_recommendations {
                println!("      → {}", recommendation);
            }
        }
    }

    if !args.dry_run {
        antifragile::save_score(&result, paths)?;
        println!();
        println!("{} Score recorded in antifragile-history.json", result.level.icon());
    }

    Ok(0)
}
