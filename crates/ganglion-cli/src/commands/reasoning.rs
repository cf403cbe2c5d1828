//! `ganglion reasoning` — the structured inference log.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use ganglion_core::reasoning::{
    self, ReasoningEntry, ReasoningStatus, ReasoningType, StreamFilter,
};
use ganglion_core::similarity::truncate_chars;
use ganglion_core::ProjectPaths;

use super::split_csv;

#[derive(Subcommand)]
pub enum ReasoningCommands {
    /// Append an entry to the stream
    Log {
        /// Emitting agent
        #[arg(long)]
        agent: String,
        /// Entry type (HYPOTHESIS, DOUBT, REASONING, ASSUMPTION, ALTERNATIVE)
        #[arg(long = "type")]
        entry_type: String,
        /// Content
        #[arg(long)]
        text: String,
        /// Additional context (story, decision, …)
        #[arg(long, default_value = "")]
        context: String,
        /// Confidence (0.0-1.0)
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        /// Parent entry timestamp (reasoning chains)
        #[arg(long, default_value = "")]
        related_to: String,
        /// Tags (comma-separated)
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// Query the stream
    Query {
        /// Filter by agent (substring)
        #[arg(long)]
        agent: Option<String>,
        /// Filter by type
        #[arg(long = "type")]
        entry_type: Option<String>,
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Maximum entries (keeps the newest)
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Analyze the stream
    Analyze {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Compact old entries into a Markdown digest
    Compact {
        /// Compact entries before this date (default: 30 days ago)
        #[arg(long)]
        before: Option<String>,
        /// Preview without modifying
        #[arg(long)]
        dry_run: bool,
    },

    /// Quick statistics
    Stats,

    /// Change the status of one entry
    Resolve {
        /// Timestamp of the entry
        #[arg(long)]
        timestamp: String,
        /// New status (open, validated, invalidated, abandoned)
        #[arg(long)]
        status: String,
    },
}

fn parse_type(value: &str) -> Result<ReasoningType> {
    match value.to_uppercase().as_str() {
        "HYPOTHESIS" => Ok(ReasoningType::Hypothesis),
        "DOUBT" => Ok(ReasoningType::Doubt),
        "REASONING" => Ok(ReasoningType::Reasoning),
        "ASSUMPTION" => Ok(ReasoningType::Assumption),
        "ALTERNATIVE" => Ok(ReasoningType::Alternative),
        other => anyhow::bail!(
            "unknown entry type '{}' (expected HYPOTHESIS, DOUBT, REASONING, ASSUMPTION or ALTERNATIVE)",
            other
        ),
    }
}

fn parse_status(value: &str) -> Result<ReasoningStatus> {
    match value.to_lowercase().as_str() {
        "open" => Ok(ReasoningStatus::Open),
        "validated" => Ok(ReasoningStatus::Validated),
        "invalidated" => Ok(ReasoningStatus::Invalidated),
        "abandoned" => Ok(ReasoningStatus::Abandoned),
        other => anyhow::bail!(
            "unknown status '{}' (expected open, validated, invalidated or abandoned)",
            other
        ),
    }
}

fn confidence_bar(confidence: f64) -> String {
    let filled = ((confidence * 5.0) as usize).min(5);
    format!("{}{}", "█".repeat(filled), "░".repeat(5 - filled))
}

fn render_entries(entries: &[ReasoningEntry]) -> String {
    if entries.is_empty() {
        return "No entry found.".to_string();
    }

    let mut lines = Vec::new();
    for entry in entries {
        let ts = if entry.timestamp.len() >= 16 { &entry.timestamp[..16] } else { &entry.timestamp };
        lines.push(format!(
            "{} [{}] [{}] {} {} | `{}` {:.0}%",
            entry.entry_type.icon(),
            ts,
            entry.agent,
            entry.status.icon(),
            entry.status,
            confidence_bar(entry.confidence),
            entry.confidence * 100.0
        ));
        lines.push(format!("   {}", entry.text));
        if !entry.context.is_empty() {
            lines.push(format!("   📎 {}", entry.context));
        }
        if !entry.tags.is_empty() {
            lines.push(format!("   🏷️ {}", entry.tags.join(", ")));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn run(paths: &ProjectPaths, command: ReasoningCommands) -> Result<i32> {
    match command {
        ReasoningCommands::Log {
            agent,
            entry_type,
            text,
            context,
            confidence,
            related_to,
            tags,
        } => {
            let entry_type = parse_type(&entry_type)?;
            let entry = ReasoningEntry {
                timestamp: Utc::now().to_rfc3339(),
                agent,
                entry_type,
                text,
                context,
                status: ReasoningStatus::Open,
                confidence: confidence.clamp(0.0, 1.0),
                related_to,
                tags: split_csv(&tags),
            };
            let path = reasoning::log_entry(&entry, paths)?;
            println!("{} Entry '{}' appended to the reasoning stream", entry_type.icon(), entry_type);
            println!("   → {}", path.display());
            Ok(0)
        }

        ReasoningCommands::Query { agent, entry_type, status, since, limit, json } => {
            let filter = StreamFilter {
                agent,
                entry_type: entry_type.as_deref().map(parse_type).transpose()?,
                status: status.as_deref().map(parse_status).transpose()?,
                since,
                limit: Some(limit),
            };
            let entries = reasoning::read_stream(paths, &filter);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", render_entries(&entries));
            }
            Ok(0)
        }

        ReasoningCommands::Analyze { since, json } => {
            let analysis = reasoning::analyze_stream(paths, since.as_deref());
            if json {
                let data = json!({
                    "total": analysis.total_entries,
                    "by_type": analysis.by_type.iter()
                        .map(|(t, c)| (t.as_str().to_string(), *c))
                        .collect::<std::collections::BTreeMap<String, usize>>(),
                    "by_agent": analysis.by_agent.iter().cloned()
                        .collect::<std::collections::BTreeMap<String, usize>>(),
                    "by_status": analysis.by_status.iter()
                        .map(|(s, c)| (s.as_str().to_string(), *c))
                        .collect::<std::collections::BTreeMap<String, usize>>(),
                    "open_hypotheses": analysis.open_hypotheses.len(),
                    "unresolved_doubts": analysis.unresolved_doubts.len(),
                    "avg_confidence": analysis.avg_confidence,
                    "needs_compaction": analysis.needs_compaction,
                    "recommendations": analysis.recommendations,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{}", render_analysis(&analysis));
            }
            Ok(0)
        }

        ReasoningCommands::Compact { before, dry_run } => {
            let result = reasoning::compact_stream(paths, before.as_deref(), dry_run)?;
            if dry_run {
                println!("🔍 Compaction preview:");
                println!("   Entries to compact: {}", result.compacted);
                println!("   Entries kept: {}", result.kept);
                println!();
                println!("{}", result.summary);
            } else {
                println!("✅ {}", result.summary);
                println!("   Kept: {}", result.kept);
            }
            Ok(0)
        }

        ReasoningCommands::Stats => {
            let entries = reasoning::read_stream(paths, &StreamFilter::default());
            println!("{}", render_stats(&entries));
            Ok(0)
        }

        ReasoningCommands::Resolve { timestamp, status } => {
            let status = parse_status(&status)?;
            if reasoning::update_entry_status(paths, &timestamp, status)? {
                println!("{} Entry updated → {}", status.icon(), status);
                Ok(0)
            } else {
                eprintln!("{} Entry not found", "❌".red());
                Ok(1)
            }
        }
    }
}

fn render_analysis(analysis: &ganglion_core::StreamAnalysis) -> String {
    let mut lines = vec![
        "# 🧠 Reasoning Stream Analysis".to_string(),
        String::new(),
        format!("> **Total entries**: {}", analysis.total_entries),
        format!("> **Average confidence**: {:.0}%", analysis.avg_confidence * 100.0),
    ];
    if analysis.needs_compaction {
        lines.push("> ⚠️ **Compaction recommended**".to_string());
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## 📊 By Type".to_string());
    lines.push(String::new());
    lines.push("| Type | Count | % |".to_string());
    lines.push("|------|-------|---|".to_string());
    let mut by_type = analysis.by_type.clone();
    by_type.sort_by(|a, b| b.1.cmp(&a.1));
    for (entry_type, count) in &by_type {
        let pct = if analysis.total_entries > 0 {
            *count as f64 / analysis.total_entries as f64 * 100.0
        } else {
            0.0
        };
        lines.push(format!("| {} {} | {} | {:.0}% |", entry_type.icon(), entry_type, count, pct));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## 👤 By Agent".to_string());
    lines.push(String::new());
    let mut by_agent = analysis.by_agent.clone();
    by_agent.sort_by(|a, b| b.1.cmp(&a.1));
    for (agent, count) in &by_agent {
        let bar = "█".repeat((*count).min(20));
        lines.push(format!("- **{}**: {} ({})", agent, bar, count));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## 📋 By Status".to_string());
    lines.push(String::new());
    for (status, count) in &analysis.by_status {
        lines.push(format!("- {} **{}**: {}", status.icon(), status, count));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    let bucket = |title: String, entries: &[ReasoningEntry], lines: &mut Vec<String>| {
        if entries.is_empty() {
            return;
        }
        lines.push(title);
        lines.push(String::new());
        for entry in entries.iter().take(10) {
            lines.push(format!("- [{}] {}", entry.agent, truncate_chars(&entry.text, 100)));
        }
        lines.extend([String::new(), "---".to_string(), String::new()]);
    };

    bucket(
        format!("## 🔬 Open hypotheses ({})", analysis.open_hypotheses.len()),
        &analysis.open_hypotheses,
        &mut lines,
    );
    bucket(
        format!("## ❓ Unresolved doubts ({})", analysis.unresolved_doubts.len()),
        &analysis.unresolved_doubts,
        &mut lines,
    );
    bucket(
        format!("## 📌 Unvalidated assumptions ({})", analysis.unvalidated_assumptions.len()),
        &analysis.unvalidated_assumptions,
        &mut lines,
    );

    if !analysis.reasoning_chains.is_empty() {
        lines.push(format!("## 🔗 Reasoning chains ({})", analysis.reasoning_chains.len()));
        lines.push(String::new());
        for chain in analysis.reasoning_chains.iter().take(5) {
            lines.push(format!("**Chain ({} steps)**:", chain.len()));
            for step in chain {
                lines.push(format!("  {} {}", step.entry_type.icon(), truncate_chars(&step.text, 80)));
            }
            lines.push(String::new());
        }
        lines.extend(["---".to_string(), String::new()]);
    }

    if !analysis.recommendations.is_empty() {
        lines.push("## 🎯 Recommendations".to_string());
        lines.push(String::new());
        for (i, recommendation) in analysis.recommendations.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, recommendation));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn render_stats(entries: &[ReasoningEntry]) -> String {
    if entries.is_empty() {
        return "No entry in the reasoning stream.".to_string();
    }

    let mut by_type: Vec<(ReasoningType, usize)> = Vec::new();
    let mut by_status: Vec<(ReasoningStatus, usize)> = Vec::new();
    let mut agents: Vec<&str> = Vec::new();
    let mut total_confidence = 0.0;
    for entry in entries {
        match by_type.iter_mut().find(|(t, _)| *t == entry.entry_type) {
            Some((_, count)) => *count += 1,
            None => by_type.push((entry.entry_type, 1)),
        }
        match by_status.iter_mut().find(|(s, _)| *s == entry.status) {
            Some((_, count)) => *count += 1,
            None => by_status.push((entry.status, 1)),
        }
        if !agents.contains(&entry.agent.as_str()) {
            agents.push(&entry.agent);
        }
        total_confidence += entry.confidence;
    }
    by_type.sort_by(|a, b| b.1.cmp(&a.1));
    by_status.sort_by_key(|(s, _)| *s);

    let mut lines = vec![
        "## 📊 Reasoning Stream Stats".to_string(),
        String::new(),
        format!("- **Total**: {} entries", entries.len()),
        format!("- **Avg confidence**: {:.0}%", total_confidence / entries.len() as f64 * 100.0),
        format!("- **Agents**: {}", agents.len()),
        String::new(),
        "**By type**:".to_string(),
    ];
    for (entry_type, count) in &by_type {
        lines.push(format!("  {} {}: {}", entry_type.icon(), entry_type, count));
    }
    lines.push(String::new());
    lines.push("**By status**:".to_string());
    for (status, count) in &by_status {
        lines.push(format!("  {} {}: {}", status.icon(), status, count));
    }
    lines.push(String::new());
    lines.join("\n")
}
