//! Dream journal
//!
//! Markdown rendering of a dream cycle, archive rotation of past journals,
//! and the incremental last-run stamp used by `--since auto`.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::memory::sources::MemorySource;
use crate::memory::{ProjectPaths, Result, write_text_atomic};

use super::memory::DreamDiff;
use super::DreamInsight;

fn confidence_bar(confidence: f64) -> String {
    let filled = (confidence * 10.0) as usize;
    let filled = filled.min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Render the journal for one dream cycle.
pub fn render_journal(
    insights: &[DreamInsight],
    sources: &[MemorySource],
    since: Option<&str>,
    diff: Option<&DreamDiff>,
) -> String {
    let now = Utc::now().format("%Y-%m-%d %H:%M");
    let total_entries: usize = sources.iter().map(|s| s.entries.len()).sum();

    let mut lines = vec![
        format!("# 🌙 Dream Journal — {}", now),
        String::new(),
        format!(
            "> Off-session consolidation — {} sources, {} entries analyzed",
            sources.len(),
            total_entries
        ),
    ];
    if let Some(since) = since {
        lines.push(format!("> Period: since {}", since));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    // Dream diff
    if let Some(diff) = diff
        && !diff.is_empty()
    {
        lines.push("## 🔀 Dream Diff".to_string());
        lines.push(String::new());
        if !diff.persistent.is_empty() {
            lines.push(format!(
                "**🔁 Persistent** ({}) — insights confirmed across sessions:",
                diff.persistent.len()
            ));
            for insight in &diff.persistent {
                lines.push(format!("- ⬆️ {} ({:.0}%)", insight.title, insight.confidence * 100.0));
            }
            lines.push(String::new());
        }
        if !diff.new.is_empty() {
            lines.push(format!("**🆕 New** ({}):", diff.new.len()));
            for insight in &diff.new {
                lines.push(format!("- {}", insight.title));
            }
            lines.push(String::new());
        }
        if !diff.resolved.is_empty() {
            lines.push(format!("**✅ Resolved** ({}) — no longer appearing:", diff.resolved.len()));
            for signature in &diff.resolved {
                lines.push(format!("- ~{}~", signature));
            }
            lines.push(String::new());
        }
        lines.extend(["---".to_string(), String::new()]);
    }

    // Per-category summary
    let mut categories: Vec<(&str, Vec<&DreamInsight>)> = Vec::new();
    for insight in insights {
        match categories.iter_mut().find(|(c, _)| *c == insight.category.as_str()) {
            Some((_, items)) => items.push(insight),
            None => categories.push((insight.category.as_str(), vec![insight])),
        }
    }
    categories.sort_by_key(|(c, _)| *c);

    lines.push("## 📊 Summary".to_string());
    lines.push(String::new());
    lines.push("| Category | Count | Avg confidence |".to_string());
    lines.push("|----------|-------|----------------|".to_string());
    for (name, items) in &categories {
        let icon = items[0].category.icon();
        let avg: f64 = items.iter().map(|i| i.confidence).sum::<f64>() / items.len() as f64;
        lines.push(format!("| {} {} | {} | {:.0}% |", icon, name, items.len(), avg * 100.0));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    // Ranked insights
    lines.push("## 🧠 Insights".to_string());
    lines.push(String::new());
    for (index, insight) in insights.iter().enumerate() {
        lines.push(format!("### {} {}. {}", insight.category.icon(), index + 1, insight.title));
        lines.push(String::new());
        lines.push(format!(
            "**Confidence**: `{}` {:.0}%",
            confidence_bar(insight.confidence),
            insight.confidence * 100.0
        ));
        lines.push(format!("**Sources**: {}", insight.sources.join(", ")));
        if insight.actionable {
            lines.push("**🎯 Actionable**".to_string());
        }
        lines.push(String::new());
        lines.push(insight.description.clone());
        lines.push(String::new());
    }

    // Source inventory
    lines.extend(["---".to_string(), String::new(), "## 📚 Sources analyzed".to_string(), String::new()]);
    for src in sources {
        lines.push(format!("- **{}** ({}) — {} entries", src.name, src.kind, src.entries.len()));
    }
    lines.push(String::new());

    lines.join("\n")
}

/// Write the journal, rotating any previous one into `dream-archives/`.
/// In dry-run mode nothing touches disk; the target path is still
/// returned so callers can report it.
pub fn write_journal(content: &str, paths: &ProjectPaths, dry_run: bool) -> Result<PathBuf> {
    let journal_path = paths.dream_journal();
    if dry_run {
        return Ok(journal_path);
    }

    if journal_path.exists() {
        let archive_dir = paths.dream_archives();
        fs::create_dir_all(&archive_dir)?;
        let stamp = Utc::now().format("%Y%m%d-%H%M");
        fs::rename(&journal_path, archive_dir.join(format!("dream-journal-{}.md", stamp)))?;
    }

    write_text_atomic(&journal_path, content)?;
    Ok(journal_path)
}

/// Read the last-run stamp for `--since auto`. Returns `None` when absent
/// or not shaped like `YYYY-MM-DD`.
pub fn read_last_dream_timestamp(paths: &ProjectPaths) -> Option<String> {
    let raw = fs::read_to_string(paths.dream_last_run()).ok()?;
    let stamp = raw.trim().to_string();
    let shaped = stamp.len() == 10 && stamp.as_bytes()[4] == b'-' && stamp.as_bytes()[7] == b'-';
    shaped.then_some(stamp)
}

/// Record today's date as the last successful dream.
pub fn save_last_dream_timestamp(paths: &ProjectPaths) -> Result<()> {
    write_text_atomic(
        &paths.dream_last_run(),
        &Utc::now().format("%Y-%m-%d").to_string(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
