//! Reasoning stream
//!
//! Append-only JSONL log of typed inference steps. Captures the WHY behind
//! decisions, not only the WHAT: hypotheses to validate, explicit doubts,
//! reasoning chains, implicit assumptions, discarded alternatives.
//!
//! The stream lives in `_bmad-output/reasoning-stream.jsonl`. Appends
//! preserve insertion order; status updates rewrite the file in place
//! without reordering and keep corrupt lines verbatim. Compaction moves
//! aged records into a Markdown digest — it never deletes knowledge.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{ProjectPaths, Result, write_text_atomic};
use crate::similarity::truncate_chars;

/// Entry count above which analysis recommends compaction.
pub const MAX_STREAM_ENTRIES: usize = 5000;
/// Default compaction horizon, in days.
pub const COMPACT_THRESHOLD_DAYS: i64 = 30;

// ============================================================================
// TYPES
// ============================================================================

/// Kinds of inference steps. Spellings persist in the JSONL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasoningType {
    /// Formulated, awaiting validation.
    Hypothesis,
    /// Explicit uncertainty signal.
    Doubt,
    /// Reasoning chain behind a decision.
    Reasoning,
    /// Implicit premise taken as true.
    Assumption,
    /// Option considered then set aside.
    Alternative,
}

impl ReasoningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningType::Hypothesis => "HYPOTHESIS",
            ReasoningType::Doubt => "DOUBT",
            ReasoningType::Reasoning => "REASONING",
            ReasoningType::Assumption => "ASSUMPTION",
            ReasoningType::Alternative => "ALTERNATIVE",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ReasoningType::Hypothesis => "🔬",
            ReasoningType::Doubt => "❓",
            ReasoningType::Reasoning => "🧠",
            ReasoningType::Assumption => "📌",
            ReasoningType::Alternative => "🔀",
        }
    }
}

impl std::fmt::Display for ReasoningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningStatus {
    #[default]
    Open,
    Validated,
    Invalidated,
    Abandoned,
}

impl ReasoningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningStatus::Open => "open",
            ReasoningStatus::Validated => "validated",
            ReasoningStatus::Invalidated => "invalidated",
            ReasoningStatus::Abandoned => "abandoned",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ReasoningStatus::Open => "⏳",
            ReasoningStatus::Validated => "✅",
            ReasoningStatus::Invalidated => "❌",
            ReasoningStatus::Abandoned => "🚫",
        }
    }
}

impl std::fmt::Display for ReasoningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record of the stream. One JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningEntry {
    pub timestamp: String,
    pub agent: String,
    #[serde(rename = "type")]
    pub entry_type: ReasoningType,
    pub text: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub status: ReasoningStatus,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Timestamp of the parent entry, for reasoning chains.
    #[serde(default)]
    pub related_to: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_confidence() -> f64 {
    0.5
}

impl ReasoningEntry {
    pub fn new(agent: &str, entry_type: ReasoningType, text: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            agent: agent.to_string(),
            entry_type,
            text: text.to_string(),
            context: String::new(),
            status: ReasoningStatus::Open,
            confidence: 0.5,
            related_to: String::new(),
            tags: Vec::new(),
        }
    }
}

// ============================================================================
// READ / WRITE
// ============================================================================

/// Append one entry to the stream. Opens in append mode; insertion order
/// is the file order.
pub fn log_entry(entry: &ReasoningEntry, paths: &ProjectPaths) -> Result<PathBuf> {
    let path = paths.reasoning_stream();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    Ok(path)
}

/// Query filters for [`read_stream`].
#[derive(Debug, Clone, Default)]
pub struct StreamFilter {
    /// Case-insensitive substring on the agent.
    pub agent: Option<String>,
    pub entry_type: Option<ReasoningType>,
    pub status: Option<ReasoningStatus>,
    /// Lexicographic compare on the first 10 chars of the timestamp.
    pub since: Option<String>,
    /// Keep only the newest N entries.
    pub limit: Option<usize>,
}

/// Read and filter the stream. Corrupt lines are skipped.
pub fn read_stream(paths: &ProjectPaths, filter: &StreamFilter) -> Vec<ReasoningEntry> {
    let Ok(content) = fs::read_to_string(paths.reasoning_stream()) else {
        return Vec::new();
    };

    let mut entries: Vec<ReasoningEntry> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<ReasoningEntry>(line) else {
            continue;
        };
        if let Some(agent) = &filter.agent
            && !entry.agent.to_lowercase().contains(&agent.to_lowercase())
        {
            continue;
        }
        if let Some(entry_type) = filter.entry_type
            && entry.entry_type != entry_type
        {
            continue;
        }
        if let Some(status) = filter.status
            && entry.status != status
        {
            continue;
        }
        if let Some(since) = &filter.since {
            let date = if entry.timestamp.len() >= 10 { &entry.timestamp[..10] } else { "" };
            if date < since.as_str() {
                continue;
            }
        }
        entries.push(entry);
    }

    if let Some(limit) = filter.limit
        && entries.len() > limit
    {
        entries.drain(..entries.len() - limit);
    }
    entries
}

/// Change the status of the entry with the given timestamp. The file is
/// rewritten preserving order; corrupt lines pass through verbatim.
/// Returns false when no entry matched.
pub fn update_entry_status(
    paths: &ProjectPaths,
    timestamp: &str,
    new_status: ReasoningStatus,
) -> Result<bool> {
    let path = paths.reasoning_stream();
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(false);
    };

    let mut updated = false;
    let mut new_lines: Vec<String> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            new_lines.push(line.to_string());
            continue;
        }
        match serde_json::from_str::<ReasoningEntry>(line.trim()) {
            Ok(mut entry) => {
                if entry.timestamp == timestamp {
                    entry.status = new_status;
                    updated = true;
                }
                new_lines.push(serde_json::to_string(&entry)?);
            }
            Err(_) => new_lines.push(line.to_string()),
        }
    }

    if updated {
        write_text_atomic(&path, &format!("{}\n", new_lines.join("\n")))?;
    }
    Ok(updated)
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Aggregated view of the stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamAnalysis {
    pub total_entries: usize,
    pub by_type: Vec<(ReasoningType, usize)>,
    pub by_agent: Vec<(String, usize)>,
    pub by_status: Vec<(ReasoningStatus, usize)>,
    pub open_hypotheses: Vec<ReasoningEntry>,
    pub unresolved_doubts: Vec<ReasoningEntry>,
    pub abandoned_alternatives: Vec<ReasoningEntry>,
    pub unvalidated_assumptions: Vec<ReasoningEntry>,
    pub reasoning_chains: Vec<Vec<ReasoningEntry>>,
    pub avg_confidence: f64,
    pub needs_compaction: bool,
    pub recommendations: Vec<String>,
}

fn bump<K: PartialEq>(counts: &mut Vec<(K, usize)>, key: K) {
    match counts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, count)) => *count += 1,
        None => counts.push((key, 1)),
    }
}

/// Analyze the stream: counts, actionable buckets, chains, recommendations.
pub fn analyze_stream(paths: &ProjectPaths, since: Option<&str>) -> StreamAnalysis {
    let entries = read_stream(
        paths,
        &StreamFilter { since: since.map(str::to_string), ..Default::default() },
    );

    let mut by_type = Vec::new();
    let mut by_agent: Vec<(String, usize)> = Vec::new();
    let mut by_status = Vec::new();
    let mut open_hypotheses = Vec::new();
    let mut unresolved_doubts = Vec::new();
    let mut abandoned_alternatives = Vec::new();
    let mut unvalidated_assumptions = Vec::new();
    let mut total_confidence = 0.0;

    for entry in &entries {
        bump(&mut by_type, entry.entry_type);
        bump(&mut by_agent, entry.agent.clone());
        bump(&mut by_status, entry.status);
        total_confidence += entry.confidence;

        match (entry.entry_type, entry.status) {
            (ReasoningType::Hypothesis, ReasoningStatus::Open) => open_hypotheses.push(entry.clone()),
            (ReasoningType::Doubt, ReasoningStatus::Open) => unresolved_doubts.push(entry.clone()),
            (ReasoningType::Alternative, ReasoningStatus::Abandoned) => {
                abandoned_alternatives.push(entry.clone())
            }
            (ReasoningType::Assumption, ReasoningStatus::Open) => {
                unvalidated_assumptions.push(entry.clone())
            }
            _ => {}
        }
    }

    // Chains: entries linked to a parent timestamp via related_to.
    let mut reasoning_chains: Vec<Vec<ReasoningEntry>> = Vec::new();
    let mut heads: Vec<(String, Vec<ReasoningEntry>)> = Vec::new();
    for entry in &entries {
        if entry.related_to.is_empty() {
            continue;
        }
        match heads.iter_mut().find(|(ts, _)| ts == &entry.related_to) {
            Some((_, members)) => members.push(entry.clone()),
            None => heads.push((entry.related_to.clone(), vec![entry.clone()])),
        }
    }
    for (head_ts, members) in heads {
        if let Some(head) = entries.iter().find(|e| e.timestamp == head_ts) {
            let mut chain = vec![head.clone()];
            chain.extend(members);
            reasoning_chains.push(chain);
        }
    }

    let avg_confidence = if entries.is_empty() {
        0.0
    } else {
        ((total_confidence / entries.len() as f64) * 100.0).round() / 100.0
    };
    let needs_compaction = entries.len() > MAX_STREAM_ENTRIES;

    let mut recommendations = Vec::new();
    if needs_compaction {
        recommendations.push(format!(
            "The stream holds {} entries (> {}) — run `compact` to archive the old ones",
            entries.len(),
            MAX_STREAM_ENTRIES
        ));
    }
    if open_hypotheses.len() > 5 {
        recommendations.push(format!(
            "{} hypotheses still open — prioritize validating them",
            open_hypotheses.len()
        ));
    }
    if unresolved_doubts.len() > 3 {
        recommendations.push(format!(
            "{} doubts unresolved — address them or close them as abandoned",
            unresolved_doubts.len()
        ));
    }
    if unvalidated_assumptions.len() > 3 {
        recommendations.push(format!(
            "{} assumptions unvalidated — reasoning debt is accruing",
            unvalidated_assumptions.len()
        ));
    }
    if avg_confidence < 0.4 && entries.len() > 5 {
        recommendations.push(format!(
            "Low average confidence ({:.0}%) — agents lack certainty, consider more validation",
            avg_confidence * 100.0
        ));
    }

    StreamAnalysis {
        total_entries: entries.len(),
        by_type,
        by_agent,
        by_status,
        open_hypotheses,
        unresolved_doubts,
        abandoned_alternatives,
        unvalidated_assumptions,
        reasoning_chains,
        avg_confidence,
        needs_compaction,
        recommendations,
    }
}

// ============================================================================
// COMPACTION
// ============================================================================

/// Compaction outcome.
#[derive(Debug, Clone)]
pub struct CompactResult {
    pub compacted: usize,
    pub kept: usize,
    pub summary: String,
    pub dry_run: bool,
}

/// Move entries older than `before` (default: 30 days ago) into a Markdown
/// digest appended to `reasoning-stream-compacted.md`, then rewrite the
/// stream with only the younger records. Grouped by type then status, up
/// to 10 examples per subgroup.
pub fn compact_stream(
    paths: &ProjectPaths,
    before: Option<&str>,
    dry_run: bool,
) -> Result<CompactResult> {
    let cutoff = match before {
        Some(date) => date.to_string(),
        None => (Utc::now() - Duration::days(COMPACT_THRESHOLD_DAYS))
            .format("%Y-%m-%d")
            .to_string(),
    };

    let entries = read_stream(paths, &StreamFilter::default());
    let (old, keep): (Vec<ReasoningEntry>, Vec<ReasoningEntry>) = entries
        .into_iter()
        .partition(|e| e.timestamp.len() >= 10 && &e.timestamp[..10] < cutoff.as_str());

    if old.is_empty() {
        return Ok(CompactResult {
            compacted: 0,
            kept: keep.len(),
            summary: "Nothing to compact".to_string(),
            dry_run,
        });
    }

    let mut summary_lines = vec![
        format!("# Reasoning Stream — Compaction {}", Utc::now().format("%Y-%m-%d")),
        String::new(),
        format!("> {} entries compacted (before {})", old.len(), cutoff),
        String::new(),
    ];

    let mut by_type: Vec<(ReasoningType, Vec<&ReasoningEntry>)> = Vec::new();
    for entry in &old {
        match by_type.iter_mut().find(|(t, _)| *t == entry.entry_type) {
            Some((_, items)) => items.push(entry),
            None => by_type.push((entry.entry_type, vec![entry])),
        }
    }
    by_type.sort_by_key(|(t, _)| *t);

    for (entry_type, type_entries) in by_type {
        summary_lines.push(format!("## {} ({})", entry_type, type_entries.len()));
        summary_lines.push(String::new());

        let mut by_status: Vec<(ReasoningStatus, Vec<&ReasoningEntry>)> = Vec::new();
        for entry in type_entries {
            match by_status.iter_mut().find(|(s, _)| *s == entry.status) {
                Some((_, items)) => items.push(entry),
                None => by_status.push((entry.status, vec![entry])),
            }
        }
        by_status.sort_by_key(|(s, _)| *s);

        for (status, status_entries) in by_status {
            summary_lines.push(format!("### {} ({})", status, status_entries.len()));
            for entry in status_entries.iter().take(10) {
                let ellipsis = if entry.text.chars().count() > 120 { "..." } else { "" };
                summary_lines.push(format!(
                    "- [{}] {}{}",
                    entry.agent,
                    truncate_chars(&entry.text, 120),
                    ellipsis
                ));
            }
            if status_entries.len() > 10 {
                summary_lines.push(format!("  _... and {} more_", status_entries.len() - 10));
            }
            summary_lines.push(String::new());
        }
    }

    let digest = summary_lines.join("\n");
    if dry_run {
        return Ok(CompactResult {
            compacted: old.len(),
            kept: keep.len(),
            summary: digest,
            dry_run: true,
        });
    }

    // Append the digest to the compacted archive
    let compact_path = paths.reasoning_compacted();
    if let Some(parent) = compact_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&compact_path)?;
    file.write_all(digest.as_bytes())?;
    file.write_all(b"\n\n---\n\n")?;

    // Rewrite the stream with only the young records
    let mut stream_content = String::new();
    for entry in &keep {
        stream_content.push_str(&serde_json::to_string(entry)?);
        stream_content.push('\n');
    }
    write_text_atomic(&paths.reasoning_stream(), &stream_content)?;

    Ok(CompactResult {
        compacted: old.len(),
        kept: keep.len(),
        summary: format!("Compacted {} entries → reasoning-stream-compacted.md", old.len()),
        dry_run: false,
    })
}

// ============================================================================
// TESTS
// ============================================================================
