//! Anti-fragility scorer
//!
//! Measures how well the system learns from its own failures. Crosses the
//! failure museum, SIL signals, contradictions, learnings and decisions
//! into a composite 0-100 score over six weighted dimensions:
//!
//! - `< 30`  — FRAGILE: the system breaks and does not learn
//! - `30-60` — ROBUST: the system survives but does not improve
//! - `>= 60` — ANTIFRAGILE: the system improves under stress

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::memory::sources::extract_date;
use crate::memory::{ProjectPaths, Result, read_json, write_json_atomic};

/// Below this composite the system is FRAGILE.
pub const FRAGILE_THRESHOLD: f64 = 30.0;
/// Below this composite the system is ROBUST, at or above ANTIFRAGILE.
pub const ROBUST_THRESHOLD: f64 = 60.0;

/// Dimension weights; they sum to 1.0.
pub const WEIGHT_RECOVERY: f64 = 0.25;
pub const WEIGHT_LEARNING_VELOCITY: f64 = 0.20;
pub const WEIGHT_CONTRADICTION_RESOLUTION: f64 = 0.15;
pub const WEIGHT_SIGNAL_TREND: f64 = 0.15;
pub const WEIGHT_DECISION_QUALITY: f64 = 0.10;
pub const WEIGHT_PATTERN_RECURRENCE: f64 = 0.15;

/// Failure museum categories.
pub const FAILURE_CATEGORIES: &[&str] = &[
    "CC-FAIL", "WRONG-ASSUMPTION", "CONTEXT-LOSS",
    "HALLUCINATION", "ARCH-MISTAKE", "PROCESS-SKIP",
];

/// SIL (Signal-In-the-Loop) marker groups, scanned over decisions and
/// learnings. Bilingual: the memory files mix FR and EN.
const SIL_MARKERS: &[(&str, &[&str])] = &[
    ("cc_fail", &["cc fail", "cc_fail", "sans vérif", "terminé sans"]),
    ("incomplete", &["manquant", "todo", "non implémenté", "incomplet", "oublié"]),
    ("contradiction", &["contradiction", "désaccord", "conflit"]),
    ("guardrail_miss", &["supprimé sans", "écrasé", "overwrite", "destroy"]),
    ("expertise_gap", &["correction", "en fait", "incorrect", "trompé"]),
];

/// Markers flagging a reversed decision.
const REVERSAL_MARKERS: &[&str] = &[
    "annulé", "reverté", "inversé", "cancel", "revert",
    "rollback", "en fait non", "revenir sur", "abandonné",
];

// ============================================================================
// TYPES
// ============================================================================

/// Overall level bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AntifragileLevel {
    Fragile,
    Robust,
    Antifragile,
}

impl AntifragileLevel {
    pub fn from_score(score: f64) -> Self {
        if score < FRAGILE_THRESHOLD {
            AntifragileLevel::Fragile
        } else if score < ROBUST_THRESHOLD {
            AntifragileLevel::Robust
        } else {
            AntifragileLevel::Antifragile
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AntifragileLevel::Fragile => "FRAGILE",
            AntifragileLevel::Robust => "ROBUST",
            AntifragileLevel::Antifragile => "ANTIFRAGILE",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AntifragileLevel::Fragile => "🔴",
            AntifragileLevel::Robust => "🟡",
            AntifragileLevel::Antifragile => "🟢",
        }
    }
}

impl std::fmt::Display for AntifragileLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score of one dimension.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionScore {
    pub name: &'static str,
    /// 0.0 - 1.0
    pub score: f64,
    pub weight: f64,
    /// score × weight
    pub weighted: f64,
    pub evidence_count: usize,
    pub details: String,
    pub recommendations: Vec<String>,
}

/// Full scoring result.
#[derive(Debug, Clone, Serialize)]
pub struct AntifragileResult {
    pub timestamp: String,
    /// 0-100
    pub global_score: f64,
    pub level: AntifragileLevel,
    pub dimensions: Vec<DimensionScore>,
    pub total_evidence: usize,
    pub summary: String,
    pub since: Option<String>,
}

// ============================================================================
// DATA COLLECTION
// ============================================================================

#[derive(Debug, Default)]
pub struct FailureStats {
    pub total: usize,
    pub with_rule: usize,
    pub with_lesson: usize,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct ContradictionStats {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
}

#[derive(Debug, Default)]
pub struct SilSignals {
    pub counts: BTreeMap<&'static str, usize>,
}

impl SilSignals {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn get(&self, group: &str) -> usize {
        self.counts.get(group).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct LearningStats {
    pub total: usize,
    pub per_agent: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct DecisionStats {
    pub total: usize,
    pub reversals: usize,
}

/// Dated list-style entries of a markdown file, including `### [` section
/// headers (the failure museum counts sections, not bullets).
fn count_entries(path: &Path, since: Option<&str>) -> Vec<(String, String)> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || (line.starts_with('#') && !line.starts_with("### [")) {
            continue;
        }
        if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("### [") {
            let date = extract_date(line);
            if let Some(cutoff) = since
                && !date.is_empty()
                && date.as_str() < cutoff
            {
                continue;
            }
            entries.push((date, line.to_string()));
        }
    }
    entries
}

/// Parse failure-museum sections: totals, attached rules and lessons,
/// category distribution.
pub fn count_failure_sections(path: &Path, since: Option<&str>) -> FailureStats {
    let Ok(content) = fs::read_to_string(path) else {
        return FailureStats::default();
    };

    let mut stats = FailureStats::default();
    let mut in_entry = false;
    let mut has_rule = false;
    let mut has_lesson = false;

    let flush = |in_entry: bool, has_rule: bool, has_lesson: bool, stats: &mut FailureStats| {
        if in_entry {
            if has_rule {
                stats.with_rule += 1;
            }
            if has_lesson {
                stats.with_lesson += 1;
            }
        }
    };

    for line in content.lines() {
        if line.starts_with("### [") {
            flush(in_entry, has_rule, has_lesson, &mut stats);

            let date = extract_date(line);
            if let Some(cutoff) = since
                && !date.is_empty()
                && date.as_str() < cutoff
            {
                in_entry = false;
                continue;
            }

            in_entry = true;
            has_rule = false;
            has_lesson = false;
            stats.total += 1;
            for category in FAILURE_CATEGORIES {
                if line.contains(category) {
                    *stats.categories.entry((*category).to_string()).or_insert(0) += 1;
                }
            }
        }

        if in_entry {
            let lower = line.to_lowercase();
            if lower.contains("règle instaurée") || lower.contains("rule") {
                has_rule = true;
            }
            if lower.contains("leçon") || lower.contains("lesson") {
                has_lesson = true;
            }
        }
    }
    flush(in_entry, has_rule, has_lesson, &mut stats);

    stats
}

/// Count contradiction-log table rows by status.
pub fn count_contradictions(path: &Path) -> ContradictionStats {
    let Ok(content) = fs::read_to_string(path) else {
        return ContradictionStats::default();
    };

    let mut stats = ContradictionStats::default();
    for line in content.lines() {
        if line.contains('|') && !line.starts_with("|--") {
            stats.total += 1;
            if line.contains('⏳') || line.contains("⚠️") {
                stats.active += 1;
            } else if line.contains('✅') || line.to_lowercase().contains("resolved") {
                stats.resolved += 1;
            }
        }
    }
    stats
}

/// Scan decisions and learnings for SIL markers.
pub fn count_sil_signals(paths: &ProjectPaths, since: Option<&str>) -> SilSignals {
    let mut signals = SilSignals::default();
    for (group, _) in SIL_MARKERS {
        signals.counts.insert(group, 0);
    }

    let mut scan = |entries: Vec<(String, String)>| {
        for (_, text) in entries {
            let lower = text.to_lowercase();
            for (group, markers) in SIL_MARKERS {
                if markers.iter().any(|m| lower.contains(m)) {
                    *signals.counts.entry(group).or_insert(0) += 1;
                }
            }
        }
    };

    scan(count_entries(&paths.decisions_log(), since));
    if let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) {
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "md") {
                scan(count_entries(&path, since));
            }
        }
    }

    signals
}

/// Learnings per agent.
pub fn count_learnings(paths: &ProjectPaths, since: Option<&str>) -> LearningStats {
    let mut stats = LearningStats::default();
    let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) else {
        return stats;
    };

    let mut files: Vec<_> = read_dir
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "md"))
        .collect();
    files.sort();

    for file in files {
        let count = count_entries(&file, since).len();
        if count > 0 {
            let agent = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            stats.per_agent.insert(agent, count);
            stats.total += count;
        }
    }
    stats
}

/// Decisions and how many were reversed.
pub fn count_decisions(paths: &ProjectPaths, since: Option<&str>) -> DecisionStats {
    let entries = count_entries(&paths.decisions_log(), since);
    let mut stats = DecisionStats { total: entries.len(), reversals: 0 };
    for (_, text) in entries {
        let lower = text.to_lowercase();
        if REVERSAL_MARKERS.iter().any(|m| lower.contains(m)) {
            stats.reversals += 1;
        }
    }
    stats
}

// ============================================================================
// DIMENSION SCORING
// ============================================================================

fn dimension(
    name: &'static str,
    score: f64,
    weight: f64,
    evidence_count: usize,
    details: String,
    recommendations: Vec<String>,
) -> DimensionScore {
    let score = score.clamp(0.0, 1.0);
    DimensionScore {
        name,
        score,
        weight,
        weighted: score * weight,
        evidence_count,
        details,
        recommendations,
    }
}

/// Recovery: failures turned into lessons and standing rules.
pub fn score_recovery(failures: &FailureStats) -> DimensionScore {
    if failures.total == 0 {
        return dimension(
            "Recovery",
            0.5,
            WEIGHT_RECOVERY,
            0,
            "No failure recorded — neutral score".to_string(),
            vec!["Start documenting failures in failure-museum.md".to_string()],
        );
    }

    let total = failures.total as f64;
    let lesson_rate = failures.with_lesson as f64 / total;
    let rule_rate = failures.with_rule as f64 / total;
    let score = rule_rate * 0.6 + lesson_rate * 0.4;

    let mut recommendations = Vec::new();
    if rule_rate < 0.5 {
        recommendations.push(format!(
            "Only {}/{} failures carry a standing rule — systematize post-incident rules",
            failures.with_rule, failures.total
        ));
    }
    if lesson_rate < 0.7 {
        recommendations.push(format!(
            "Only {}/{} failures carry a lesson — document every incident",
            failures.with_lesson, failures.total
        ));
    }

    dimension(
        "Recovery",
        score,
        WEIGHT_RECOVERY,
        failures.total,
        format!(
            "{} failures, {} lessons, {} rules ({:.0}%)",
            failures.total,
            failures.with_lesson,
            failures.with_rule,
            rule_rate * 100.0
        ),
        recommendations,
    )
}

/// Learning velocity: volume and agent distribution of learnings.
pub fn score_learning_velocity(learnings: &LearningStats) -> DimensionScore {
    if learnings.total == 0 {
        return dimension(
            "Learning velocity",
            0.0,
            WEIGHT_LEARNING_VELOCITY,
            0,
            "No learning recorded".to_string(),
            vec!["Agents should start documenting what they learn".to_string()],
        );
    }

    let agents = learnings.per_agent.len();
    let volume_score = (learnings.total as f64 / 50.0).min(1.0);
    let distribution_score = (agents as f64 / 5.0).min(1.0);
    let score = volume_score * 0.6 + distribution_score * 0.4;

    let mut recommendations = Vec::new();
    if agents < 3 {
        recommendations.push(format!(
            "Only {} agent(s) write learnings — encourage more agents",
            agents
        ));
    }
    if learnings.total < 10 {
        recommendations.push(format!(
            "Only {} learnings — aim for at least 10 to build a useful base",
            learnings.total
        ));
    }

    dimension(
        "Learning velocity",
        score,
        WEIGHT_LEARNING_VELOCITY,
        learnings.total,
        format!("{} learnings from {} agent(s)", learnings.total, agents),
        recommendations,
    )
}

/// Contradiction resolution rate.
pub fn score_contradiction_resolution(contradictions: &ContradictionStats) -> DimensionScore {
    if contradictions.total == 0 {
        return dimension(
            "Contradiction resolution",
            0.5,
            WEIGHT_CONTRADICTION_RESOLUTION,
            0,
            "No contradiction recorded — neutral score".to_string(),
            Vec::new(),
        );
    }

    let resolution_rate = contradictions.resolved as f64 / contradictions.total as f64;
    let mut recommendations = Vec::new();
    if contradictions.active > 0 {
        recommendations.push(format!(
            "{} active contradiction(s) unresolved — prioritize resolving them",
            contradictions.active
        ));
    }
    if resolution_rate < 0.5 {
        recommendations.push("Resolution rate below 50% — tensions are accumulating".to_string());
    }

    dimension(
        "Contradiction resolution",
        resolution_rate,
        WEIGHT_CONTRADICTION_RESOLUTION,
        contradictions.total,
        format!(
            "{}/{} resolved ({:.0}%), {} active",
            contradictions.resolved,
            contradictions.total,
            resolution_rate * 100.0,
            contradictions.active
        ),
        recommendations,
    )
}

/// SIL signal trend: fewer signals means the system is correcting itself.
pub fn score_signal_trend(signals: &SilSignals) -> DimensionScore {
    let total = signals.total();
    if total == 0 {
        return dimension(
            "Signal trend",
            0.7,
            WEIGHT_SIGNAL_TREND,
            0,
            "No SIL signal detected — good sign or young project".to_string(),
            Vec::new(),
        );
    }

    let mut score = (1.0 - total as f64 / 25.0).max(0.1);
    let cc_fail = signals.get("cc_fail");
    let guardrail = signals.get("guardrail_miss");
    if cc_fail + guardrail > 3 {
        score *= 0.7;
    }

    let mut recommendations = Vec::new();
    if cc_fail > 0 {
        recommendations.push(format!(
            "{} CC_FAIL detected — strengthen the completion contract",
            cc_fail
        ));
    }
    if guardrail > 0 {
        recommendations.push(format!("{} GUARDRAIL_MISS — add automated guards", guardrail));
    }
    if signals.get("expertise_gap") > 2 {
        recommendations.push("Recurring expertise gaps — consider forging a specialist agent".to_string());
    }

    let detail_parts: Vec<String> = signals
        .counts
        .iter()
        .filter(|(_, v)| **v > 0)
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect();
    let listed = if detail_parts.is_empty() { "none".to_string() } else { detail_parts.join(", ") };

    dimension(
        "Signal trend",
        score,
        WEIGHT_SIGNAL_TREND,
        total,
        format!("{} signals ({})", total, listed),
        recommendations,
    )
}

/// Decision quality: few reversals means decisions hold.
pub fn score_decision_quality(decisions: &DecisionStats) -> DimensionScore {
    if decisions.total == 0 {
        return dimension(
            "Decision quality",
            0.5,
            WEIGHT_DECISION_QUALITY,
            0,
            "No decision recorded — neutral score".to_string(),
            Vec::new(),
        );
    }

    let reversal_rate = decisions.reversals as f64 / decisions.total as f64;
    let score = (1.0 - reversal_rate * 3.0).max(0.1);

    let mut recommendations = Vec::new();
    if reversal_rate > 0.2 {
        recommendations.push(format!(
            "{}/{} decisions reversed ({:.0}%) — use adversarial consensus for critical decisions",
            decisions.reversals,
            decisions.total,
            reversal_rate * 100.0
        ));
    }

    dimension(
        "Decision quality",
        score,
        WEIGHT_DECISION_QUALITY,
        decisions.total,
        format!(
            "{} decisions, {} reversals ({:.0}%)",
            decisions.total,
            decisions.reversals,
            reversal_rate * 100.0
        ),
        recommendations,
    )
}

/// Pattern recurrence: the same failure category dominating is fragility.
pub fn score_pattern_recurrence(failures: &FailureStats) -> DimensionScore {
    let total_categorized: usize = failures.categories.values().sum();
    if total_categorized == 0 {
        return dimension(
            "Pattern recurrence",
            0.5,
            WEIGHT_PATTERN_RECURRENCE,
            0,
            "No failure pattern detected — neutral score".to_string(),
            Vec::new(),
        );
    }

    let unique = failures.categories.len();
    let diversity = unique as f64 / FAILURE_CATEGORIES.len() as f64;
    let max_count = failures.categories.values().copied().max().unwrap_or(0);
    let concentration = max_count as f64 / total_categorized as f64;
    let score = (1.0 - concentration) * 0.6 + diversity * 0.4;

    let mut recommendations = Vec::new();
    if concentration > 0.6 && max_count > 2 {
        let worst = failures
            .categories
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(category, _)| category.as_str())
            .unwrap_or("?");
        recommendations.push(format!(
            "The '{}' pattern dominates ({}/{}) — create a dedicated guardrail",
            worst, max_count, total_categorized
        ));
    }

    dimension(
        "Pattern recurrence",
        score,
        WEIGHT_PATTERN_RECURRENCE,
        total_categorized,
        format!(
            "{} failures, {} categories, concentration: {:.0}%",
            total_categorized,
            unique,
            concentration * 100.0
        ),
        recommendations,
    )
}

// ============================================================================
// COMPOSITE
// ============================================================================

/// Compute the composite score over the project's memory.
pub fn compute_antifragile_score(paths: &ProjectPaths, since: Option<&str>) -> AntifragileResult {
    let failures = count_failure_sections(&paths.failure_museum(), since);
    let contradictions = count_contradictions(&paths.contradiction_log());
    let signals = count_sil_signals(paths, since);
    let learnings = count_learnings(paths, since);
    let decisions = count_decisions(paths, since);

    let dimensions = vec![
        score_recovery(&failures),
        score_learning_velocity(&learnings),
        score_contradiction_resolution(&contradictions),
        score_signal_trend(&signals),
        score_decision_quality(&decisions),
        score_pattern_recurrence(&failures),
    ];

    let global_score = dimensions.iter().map(|d| d.weighted).sum::<f64>() * 100.0;
    let global_score = (global_score.clamp(0.0, 100.0) * 10.0).round() / 10.0;
    let level = AntifragileLevel::from_score(global_score);
    let total_evidence: usize = dimensions.iter().map(|d| d.evidence_count).sum();

    let summary = if total_evidence == 0 {
        "Young or quiet project — neutral score, no data yet. Accumulate signals for a meaningful scoring.".to_string()
    } else {
        match level {
            AntifragileLevel::Fragile => {
                "The system is FRAGILE — failures produce no systematic learning. Urgent action required.".to_string()
            }
            AntifragileLevel::Robust => {
                "The system is ROBUST — it survives failures but extracts too little from them. Room to improve.".to_string()
            }
            AntifragileLevel::Antifragile => {
                "The system is ANTI-FRAGILE — it actively improves with every stress. Keep this trajectory.".to_string()
            }
        }
    };

    AntifragileResult {
        timestamp: Utc::now().to_rfc3339(),
        global_score,
        level,
        dimensions,
        total_evidence,
        summary,
        since: since.map(str::to_string),
    }
}

// ============================================================================
// HISTORY
// ============================================================================

/// Per-dimension snapshot persisted in the history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSnapshot {
    /// 0-100, one decimal.
    pub score: f64,
    pub evidence: usize,
}

/// One persisted scoring run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub score: f64,
    pub level: AntifragileLevel,
    pub evidence: usize,
    pub dimensions: BTreeMap<String, DimensionSnapshot>,
}

/// Append one run to `antifragile-history.json`.
pub fn save_score(result: &AntifragileResult, paths: &ProjectPaths) -> Result<()> {
    let mut history = load_history(paths);
    history.push(HistoryEntry {
        timestamp: result.timestamp.clone(),
        score: result.global_score,
        level: result.level,
        evidence: result.total_evidence,
        dimensions: result
            .dimensions
            .iter()
            .map(|d| {
                (
                    d.name.to_string(),
                    DimensionSnapshot {
                        score: (d.score * 1000.0).round() / 10.0,
                        evidence: d.evidence_count,
                    },
                )
            })
            .collect(),
    });
    write_json_atomic(&paths.antifragile_history(), &history)
}

/// Load the score history; missing or corrupt files yield an empty one.
pub fn load_history(paths: &ProjectPaths) -> Vec<HistoryEntry> {
    read_json(&paths.antifragile_history()).unwrap_or_default()
}

// ============================================================================
// RENDERING
// ============================================================================

fn score_bar(score: f64, width: usize) -> String {
    let filled = (score * width as f64) as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Detailed Markdown report.
pub fn render_report(result: &AntifragileResult) -> String {
    let mut lines = vec![
        format!(
            "# {} Anti-Fragility Score — {}/100 ({})",
            result.level.icon(),
            result.global_score,
            result.level
        ),
        String::new(),
        format!("> {}", result.summary),
        format!("> **Date**: {}", &result.timestamp[..19.min(result.timestamp.len())]),
    ];
    if let Some(since) = &result.since {
        lines.push(format!("> **Period**: since {}", since));
    }
    lines.push(format!("> **Signals analyzed**: {}", result.total_evidence));
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push(format!(
        "## 📊 Global score: `{}` {}/100",
        score_bar(result.global_score / 100.0, 20),
        result.global_score
    ));
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## 🔍 Dimensions".to_string());
    lines.push(String::new());
    lines.push("| Dimension | Score | Weight | Weighted | Signals |".to_string());
    lines.push("|-----------|-------|--------|----------|---------|".to_string());
    let mut sorted: Vec<&DimensionScore> = result.dimensions.iter().collect();
    sorted.sort_by(|a, b| b.weighted.partial_cmp(&a.weighted).unwrap_or(std::cmp::Ordering::Equal));
    for d in &sorted {
        lines.push(format!(
            "| {} | `{}` {:.0}% | {:.0}% | {:.2} | {} |",
            d.name,
            score_bar(d.score, 10),
            d.score * 100.0,
            d.weight * 100.0,
            d.weighted,
            d.evidence_count
        ));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    lines.push("## 📋 Dimension details".to_string());
    lines.push(String::new());
    for d in &result.dimensions {
        let status = if d.score >= 0.6 { "🟢" } else if d.score >= 0.3 { "🟡" } else { "🔴" };
        lines.push(format!("### {} {}", status, d.name));
        lines.push(format!("**Score**: {:.0}% — {}", d.score * 100.0, d.details));
        if !d.recommendations.is_empty() {
            lines.push(String::new());
            lines.push("**Recommendations**:".to_string());
            for rec in &d.recommendations {
                lines.push(format!("- {}", rec));
            }
        }
        lines.push(String::new());
    }

    let all_recs: Vec<&String> = result.dimensions.iter().flat_map(|d| &d.recommendations).collect();
    if !all_recs.is_empty() {
        lines.extend(["---".to_string(), String::new(), "## 🎯 Action plan".to_string(), String::new()]);
        for (i, rec) in all_recs.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, rec));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// History table with the delta to the previous run.
pub fn render_trend(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "No history available. Run the scorer once to start one.".to_string();
    }

    let mut lines = vec![
        "## 📈 Anti-Fragility Trend".to_string(),
        String::new(),
        "| # | Date | Score | Level | Signals |".to_string(),
        "|---|------|-------|-------|---------|".to_string(),
    ];
    for (i, entry) in history.iter().rev().enumerate() {
        let date = &entry.timestamp[..10.min(entry.timestamp.len())];
        lines.push(format!(
            "| {} | {} | {}/100 | {} {} | {} |",
            i + 1,
            date,
            entry.score,
            entry.level.icon(),
            entry.level,
            entry.evidence
        ));
    }

    if history.len() >= 2 {
        let last = history[history.len() - 1].score;
        let prev = history[history.len() - 2].score;
        let delta = last - prev;
        let trend = if delta > 0.0 { "📈 " } else if delta < 0.0 { "📉 " } else { "➡️ " };
        lines.push(String::new());
        lines.push(format!("**Trend**: {}{:+.1} points since the previous run", trend, delta));
    }
    if history.len() >= 3 {
        let avg: f64 = history.iter().map(|h| h.score).sum::<f64>() / history.len() as f64;
        lines.push(format!("**Average**: {:.1}/100 over {} runs", avg, history.len()));
    }

    lines.push(String::new());
    lines.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.learnings_dir()).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = WEIGHT_RECOVERY
            + WEIGHT_LEARNING_VELOCITY
            + WEIGHT_CONTRADICTION_RESOLUTION
            + WEIGHT_SIGNAL_TREND
            + WEIGHT_DECISION_QUALITY
            + WEIGHT_PATTERN_RECURRENCE;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_project_is_neutral_robust() {
        let (_dir, paths) = project();
        let result = compute_antifragile_score(&paths, None);

        assert_eq!(result.total_evidence, 0);
        assert_eq!(result.level, AntifragileLevel::Robust);
        // Neutral scores: 0.5, 0.0, 0.5, 0.7, 0.5, 0.5 → weighted 0.43
        assert!((result.global_score - 43.0).abs() < 1e-9);
        assert!(result.summary.contains("no data"));
        for d in &result.dimensions {
            assert!(d.score == 0.0 || d.score == 0.5 || d.score == 0.7);
        }
    }

    #[test]
    fn test_failure_sections_rules_lessons_categories() {
        let (_dir, paths) = project();
        std::fs::write(
            paths.failure_museum(),
            concat!(
                "# Failure Museum\n\n",
                "### [2026-01-10] CC-FAIL — shipped without verification\n",
                "- Leçon : always run the checks\n",
                "- Règle instaurée : CI gate before merge\n\n",
                "### [2026-01-12] CC-FAIL — same again\n",
                "- Leçon : the gate was bypassed\n\n",
                "### [2026-01-15] HALLUCINATION — invented an API\n",
            ),
        )
        .unwrap();

        let stats = count_failure_sections(&paths.failure_museum(), None);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.with_lesson, 2);
        assert_eq!(stats.with_rule, 1);
        assert_eq!(stats.categories.get("CC-FAIL"), Some(&2));
        assert_eq!(stats.categories.get("HALLUCINATION"), Some(&1));

        let filtered = count_failure_sections(&paths.failure_museum(), Some("2026-01-11"));
        assert_eq!(filtered.total, 2);
    }

    #[test]
    fn test_recovery_score() {
        let stats = FailureStats {
            total: 4,
            with_rule: 2,
            with_lesson: 4,
            categories: BTreeMap::new(),
        };
        let d = score_recovery(&stats);
        // 0.6*(2/4) + 0.4*(4/4) = 0.7
        assert!((d.score - 0.7).abs() < 1e-9);
        assert_eq!(d.evidence_count, 4);
    }

    #[test]
    fn test_signal_trend_critical_penalty() {
        let mut signals = SilSignals::default();
        signals.counts.insert("cc_fail", 3);
        signals.counts.insert("guardrail_miss", 2);
        let d = score_signal_trend(&signals);
        // base max(0.1, 1 - 5/25) = 0.8, ×0.7 critical penalty = 0.56
        assert!((d.score - 0.56).abs() < 1e-9);
        assert!(d.recommendations.iter().any(|r| r.contains("CC_FAIL")));
    }

    #[test]
    fn test_decision_quality_floor() {
        let stats = DecisionStats { total: 4, reversals: 3 };
        let d = score_decision_quality(&stats);
        assert!((d.score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_pattern_recurrence_concentration() {
        let mut categories = BTreeMap::new();
        categories.insert("CC-FAIL".to_string(), 4);
        categories.insert("HALLUCINATION".to_string(), 1);
        let stats = FailureStats { total: 5, with_rule: 0, with_lesson: 0, categories };
        let d = score_pattern_recurrence(&stats);
        // concentration 0.8, diversity 2/6 → (1-0.8)*0.6 + 0.333*0.4 ≈ 0.2533
        assert!((d.score - (0.2 * 0.6 + (2.0 / 6.0) * 0.4)).abs() < 1e-9);
        assert!(d.recommendations.iter().any(|r| r.contains("CC-FAIL")));
    }

    #[test]
    fn test_sil_signals_scan() {
        let (_dir, paths) = project();
        std::fs::write(
            paths.decisions_log(),
            "- [2026-01-01] terminé sans tests, à corriger\n- [2026-01-02] contradiction avec la règle cache\n",
        )
        .unwrap();
        std::fs::write(
            paths.learnings_dir().join("dev.md"),
            "- [2026-01-03] fichier écrasé par erreur\n",
        )
        .unwrap();

        let signals = count_sil_signals(&paths, None);
        assert_eq!(signals.get("cc_fail"), 1);
        assert_eq!(signals.get("contradiction"), 1);
        assert_eq!(signals.get("guardrail_miss"), 1);
        assert_eq!(signals.total(), 3);
    }

    #[test]
    fn test_history_appends() {
        let (_dir, paths) = project();
        let result = compute_antifragile_score(&paths, None);
        save_score(&result, &paths).unwrap();
        save_score(&result, &paths).unwrap();

        let history = load_history(&paths);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, result.global_score);
        assert_eq!(history[0].dimensions.len(), 6);

        let trend = render_trend(&history);
        assert!(trend.contains("**Trend**"));
    }

    #[test]
    fn test_contradiction_table_parse() {
        let (_dir, paths) = project();
        std::fs::write(
            paths.contradiction_log(),
            "| Date | Topic | Status |\n|--|--|--|\n| 2026-01-01 | cache | ✅ resolved |\n| 2026-01-02 | retry | ⏳ |\n",
        )
        .unwrap();
        let stats = count_contradictions(&paths.contradiction_log());
        // Header row counts toward the total as well
        assert_eq!(stats.total, 3);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.active, 1);
    }

    #[test]
    fn test_render_report_sections() {
        let (_dir, paths) = project();
        let result = compute_antifragile_score(&paths, None);
        let report = render_report(&result);
        assert!(report.contains("Anti-Fragility Score"));
        assert!(report.contains("## 🔍 Dimensions"));
        assert!(report.contains("Recovery"));
    }
}
