//! Agent darwinism
//!
//! Evaluates per-agent fitness over successive generations and proposes
//! evolutionary actions: promote, improve, hybridize, deprecate.
//!
//! Fitness dimensions (weighted, composite 0-100):
//! - reliability  (0.25): AC pass rate, low failure count
//! - productivity (0.20): commits, decisions
//! - learning     (0.20): learnings captured in trace and learning files
//! - adaptability (0.15): diversity of stories touched
//! - resilience   (0.10): recovery after failures, no recurring patterns
//! - influence    (0.10): checkpoints, contributions to shared decisions
//!
//! Levels: ELITE >= 75, VIABLE >= 40, FRAGILE >= 20, OBSOLETE below.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::memory::{ProjectPaths, Result, read_json, write_json_atomic};

/// Dimension weights; they sum to 1.0.
pub const WEIGHT_RELIABILITY: f64 = 0.25;
pub const WEIGHT_PRODUCTIVITY: f64 = 0.20;
pub const WEIGHT_LEARNING: f64 = 0.20;
pub const WEIGHT_ADAPTABILITY: f64 = 0.15;
pub const WEIGHT_RESILIENCE: f64 = 0.10;
pub const WEIGHT_INFLUENCE: f64 = 0.10;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##\s+(\d{4}-\d{2}-\d{2}(?:\s+\d{2}:\d{2})?)\s*\|\s*([^\|]+)\s*\|\s*(.+)$")
        .expect("valid regex")
});

/// Block classifiers, applied in order; the first match wins.
static TYPE_PATTERNS: LazyLock<Vec<(TraceEventKind, Regex)>> = LazyLock::new(|| {
    vec![
        (TraceEventKind::GitCommit, Regex::new(r"\[GIT-COMMIT\]").unwrap()),
        (TraceEventKind::Decision, Regex::new(r"\[DECISION\]").unwrap()),
        (TraceEventKind::Remember, Regex::new(r"\[REMEMBER:([^\]]+)\]").unwrap()),
        (TraceEventKind::Failure, Regex::new(r"\[FAILURE\]|\[ÉCHEC\]|\bFAIL\b").unwrap()),
        (TraceEventKind::AcPass, Regex::new(r"\[AC-PASS\]|\bAC.*PASS\b|\bpasse\b.*\bAC\b").unwrap()),
        (TraceEventKind::AcFail, Regex::new(r"\[AC-FAIL\]|\bAC.*FAIL\b|\béchec\b.*\bAC\b").unwrap()),
        (TraceEventKind::Checkpoint, Regex::new(r"\[CHECKPOINT\]|checkpoint_id").unwrap()),
    ]
});

static FAILURE_CATEGORIZER: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("test-failure", Regex::new(r"(?i)test.*fail|pytest.*error|go test.*FAIL|jest.*fail").unwrap()),
        ("lint-error", Regex::new(r"(?i)lint|ruff|shellcheck|yamllint|golangci").unwrap()),
        ("recurring", Regex::new(r"(?i)again|encore|récurrent|même erreur").unwrap()),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceEventKind {
    GitCommit,
    Decision,
    Remember,
    Failure,
    AcPass,
    AcFail,
    Checkpoint,
}

// ============================================================================
// TYPES
// ============================================================================

/// Raw per-agent counters extracted from the trace.
#[derive(Debug, Clone, Default)]
pub struct RawAgentStats {
    pub agent_id: String,
    pub stories_touched: usize,
    pub decisions_count: usize,
    pub failures_count: usize,
    pub failure_patterns: Vec<String>,
    pub ac_pass_count: usize,
    pub ac_fail_count: usize,
    pub checkpoints_created: usize,
    pub commits_attributed: usize,
    pub learnings_count: usize,
    pub last_activity: String,
}

impl RawAgentStats {
    pub fn ac_total(&self) -> usize {
        self.ac_pass_count + self.ac_fail_count
    }

    /// 0-100
    pub fn ac_pass_rate(&self) -> f64 {
        if self.ac_total() == 0 {
            0.0
        } else {
            self.ac_pass_count as f64 / self.ac_total() as f64 * 100.0
        }
    }
}

/// Per-dimension fitness, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FitnessDimensions {
    pub reliability: f64,
    pub productivity: f64,
    pub learning: f64,
    pub adaptability: f64,
    pub resilience: f64,
    pub influence: f64,
}

impl FitnessDimensions {
    /// (name, value) pairs in canonical order.
    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("reliability", self.reliability),
            ("productivity", self.productivity),
            ("learning", self.learning),
            ("adaptability", self.adaptability),
            ("resilience", self.resilience),
            ("influence", self.influence),
        ]
    }

    /// Weakest dimension; ties keep the canonical order.
    pub fn weakest(&self) -> (&'static str, f64) {
        let mut weakest = ("reliability", self.reliability);
        for (name, value) in self.pairs() {
            if value < weakest.1 {
                weakest = (name, value);
            }
        }
        weakest
    }

    pub fn get(&self, name: &str) -> f64 {
        match name {
            "reliability" => self.reliability,
            "productivity" => self.productivity,
            "learning" => self.learning,
            "adaptability" => self.adaptability,
            "resilience" => self.resilience,
            _ => self.influence,
        }
    }
}

/// Evolution levels. Thresholds: ELITE 75, VIABLE 40, FRAGILE 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionLevel {
    Elite,
    Viable,
    Fragile,
    #[default]
    Obsolete,
}

impl EvolutionLevel {
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 75.0 {
            EvolutionLevel::Elite
        } else if composite >= 40.0 {
            EvolutionLevel::Viable
        } else if composite >= 20.0 {
            EvolutionLevel::Fragile
        } else {
            EvolutionLevel::Obsolete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionLevel::Elite => "ELITE",
            EvolutionLevel::Viable => "VIABLE",
            EvolutionLevel::Fragile => "FRAGILE",
            EvolutionLevel::Obsolete => "OBSOLETE",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            EvolutionLevel::Elite => "🟢",
            EvolutionLevel::Viable => "🟡",
            EvolutionLevel::Fragile => "🟠",
            EvolutionLevel::Obsolete => "🔴",
        }
    }
}

impl std::fmt::Display for EvolutionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite fitness of one agent in one generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessScore {
    pub agent_id: String,
    pub dimensions: FitnessDimensions,
    pub composite: f64,
    pub level: EvolutionLevel,
    pub generation: u32,
    pub timestamp: String,
}

/// Proposed evolutionary actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionActionKind {
    Promote,
    Improve,
    Hybridize,
    Deprecate,
    Observe,
}

impl EvolutionActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvolutionActionKind::Promote => "PROMOTE",
            EvolutionActionKind::Improve => "IMPROVE",
            EvolutionActionKind::Hybridize => "HYBRIDIZE",
            EvolutionActionKind::Deprecate => "DEPRECATE",
            EvolutionActionKind::Observe => "OBSERVE",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            EvolutionActionKind::Promote => "⬆️",
            EvolutionActionKind::Improve => "🔧",
            EvolutionActionKind::Hybridize => "🧬",
            EvolutionActionKind::Deprecate => "⬇️",
            EvolutionActionKind::Observe => "👁️",
        }
    }
}

impl std::fmt::Display for EvolutionActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recommended action for one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionAction {
    pub agent_id: String,
    pub action: EvolutionActionKind,
    pub reason: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub source_agents: Vec<String>,
}

/// Aggregated counts of one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationSummary {
    pub agents_evaluated: usize,
    pub avg_fitness: f64,
    pub elite: usize,
    pub viable: usize,
    pub fragile: usize,
    pub obsolete: usize,
}

/// One evaluation pass across all agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRecord {
    pub generation: u32,
    pub timestamp: String,
    pub scores: Vec<FitnessScore>,
    pub actions: Vec<EvolutionAction>,
    pub summary: GenerationSummary,
}

// ============================================================================
// TRACE PARSING
// ============================================================================

/// Parse BMAD_TRACE.md into per-agent counters. The trace groups event
/// payloads under `## date | agent | story` headers; each block counts as
/// one event of the first matching kind.
pub fn parse_trace_stats(trace_path: &Path, since: Option<&str>) -> BTreeMap<String, RawAgentStats> {
    let mut agents: BTreeMap<String, RawAgentStats> = BTreeMap::new();
    let Ok(content) = fs::read_to_string(trace_path) else {
        return agents;
    };

    let mut current_header: Option<(String, String, String)> = None; // (ts, agent, story)
    let mut block_lines: Vec<String> = Vec::new();

    let flush = |header: &Option<(String, String, String)>,
                     lines: &[String],
                     agents: &mut BTreeMap<String, RawAgentStats>| {
        let Some((ts, agent, story)) = header else {
            return;
        };
        let content = lines.join("\n");
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        if let Some(cutoff) = since
            && ts.len() >= 10
            && &ts[..10] < &cutoff[..10.min(cutoff.len())]
        {
            return;
        }

        let agent_id = agent.trim().to_lowercase();
        let stats = agents.entry(agent_id.clone()).or_insert_with(|| RawAgentStats {
            agent_id,
            ..Default::default()
        });

        if !story.trim().is_empty() {
            stats.stories_touched += 1;
        }
        stats.last_activity = ts.clone();

        let kind = TYPE_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(content))
            .map(|(kind, _)| *kind);

        match kind {
            Some(TraceEventKind::GitCommit) => stats.commits_attributed += 1,
            Some(TraceEventKind::Decision) => stats.decisions_count += 1,
            Some(TraceEventKind::Failure) => {
                stats.failures_count += 1;
                if let Some((category, _)) =
                    FAILURE_CATEGORIZER.iter().find(|(_, pattern)| pattern.is_match(content))
                {
                    stats.failure_patterns.push((*category).to_string());
                }
            }
            Some(TraceEventKind::AcPass) => stats.ac_pass_count += 1,
            Some(TraceEventKind::AcFail) => stats.ac_fail_count += 1,
            Some(TraceEventKind::Checkpoint) => stats.checkpoints_created += 1,
            Some(TraceEventKind::Remember) => stats.learnings_count += 1,
            None => {} // GENERIC
        }
    };

    for line in content.lines() {
        if let Some(caps) = HEADER_RE.captures(line.trim_end()) {
            flush(&current_header, &block_lines, &mut agents);
            current_header = Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()));
            block_lines.clear();
        } else if current_header.is_some() {
            block_lines.push(line.to_string());
        }
    }
    flush(&current_header, &block_lines, &mut agents);

    agents
}

/// Learnings per agent from `agent-learnings/*.md` bullet counts.
pub fn count_agent_learnings(paths: &ProjectPaths) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) else {
        return counts;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.extension().is_some_and(|e| e == "md") {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let count = content
            .lines()
            .filter(|l| {
                let l = l.trim();
                !l.is_empty() && (l.starts_with("- ") || l.starts_with("* "))
            })
            .count();
        let agent = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        counts.insert(agent, count);
    }
    counts
}

// ============================================================================
// FITNESS
// ============================================================================

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Reliability: AC pass rate weighted, minus a failure penalty. With no AC
/// data a 30-point baseline is doubled instead of rescaled, so the failure
/// penalty can drive the score to zero either way.
pub fn dimension_reliability(stats: &RawAgentStats) -> f64 {
    let has_ac = stats.ac_total() > 0;
    let mut score = if has_ac { stats.ac_pass_rate() * 0.6 } else { 30.0 };

    let failure_penalty = (stats.failures_count as f64 * 5.0).min(40.0);
    score = (score - failure_penalty).max(0.0);

    let rescaled = if has_ac { score / 0.6 } else { score * 2.0 };
    rescaled.min(100.0)
}

/// Productivity: commits and decisions, each capped at 50 points.
pub fn dimension_productivity(stats: &RawAgentStats) -> f64 {
    let commits = (stats.commits_attributed as f64 * 10.0).min(50.0);
    let decisions = (stats.decisions_count as f64 * 8.0).min(50.0);
    (commits + decisions).min(100.0)
}

/// Learning: trace REMEMBER events plus learning-file entries.
pub fn dimension_learning(stats: &RawAgentStats, external_learnings: usize) -> f64 {
    ((stats.learnings_count + external_learnings) as f64 * 10.0).min(100.0)
}

/// Adaptability: story mentions diversity.
pub fn dimension_adaptability(stats: &RawAgentStats) -> f64 {
    (stats.stories_touched as f64 * 15.0).min(100.0)
}

/// Resilience: 80 baseline with zero failures; otherwise 60 minus a
/// recurring-pattern ratio penalty, minus 5 per failure beyond five.
pub fn dimension_resilience(stats: &RawAgentStats) -> f64 {
    if stats.failures_count == 0 {
        return 80.0;
    }

    let recurring = stats.failure_patterns.iter().filter(|p| *p == "recurring").count();
    let recurring_ratio = recurring as f64 / stats.failures_count as f64;
    let mut score = 60.0 - recurring_ratio * 40.0;

    if stats.failures_count > 5 {
        score -= ((stats.failures_count - 5) as f64 * 5.0).min(30.0);
    }
    score.clamp(0.0, 100.0)
}

/// Influence: checkpoints and decisions, visible contributions.
pub fn dimension_influence(stats: &RawAgentStats) -> f64 {
    let checkpoints = (stats.checkpoints_created as f64 * 15.0).min(50.0);
    let decisions = (stats.decisions_count as f64 * 10.0).min(50.0);
    (checkpoints + decisions).min(100.0)
}

/// Compute the composite fitness of one agent.
pub fn compute_fitness(stats: &RawAgentStats, external_learnings: usize, generation: u32) -> FitnessScore {
    let dimensions = FitnessDimensions {
        reliability: round1(dimension_reliability(stats)),
        productivity: round1(dimension_productivity(stats)),
        learning: round1(dimension_learning(stats, external_learnings)),
        adaptability: round1(dimension_adaptability(stats)),
        resilience: round1(dimension_resilience(stats)),
        influence: round1(dimension_influence(stats)),
    };

    let composite = dimensions.reliability * WEIGHT_RELIABILITY
        + dimensions.productivity * WEIGHT_PRODUCTIVITY
        + dimensions.learning * WEIGHT_LEARNING
        + dimensions.adaptability * WEIGHT_ADAPTABILITY
        + dimensions.resilience * WEIGHT_RESILIENCE
        + dimensions.influence * WEIGHT_INFLUENCE;
    let composite = round1(composite);

    FitnessScore {
        agent_id: stats.agent_id.clone(),
        dimensions,
        composite,
        level: EvolutionLevel::from_composite(composite),
        generation,
        timestamp: Utc::now().to_rfc3339(),
    }
}

// ============================================================================
// EVOLUTION ACTIONS
// ============================================================================

/// Propose one action per agent, annotated with the trend against the
/// previous generation when |Δ| > 10.
pub fn propose_actions(
    scores: &[FitnessScore],
    previous: Option<&[FitnessScore]>,
) -> Vec<EvolutionAction> {
    let previous_map: BTreeMap<&str, f64> = previous
        .unwrap_or(&[])
        .iter()
        .map(|s| (s.agent_id.as_str(), s.composite))
        .collect();

    let elites: Vec<&FitnessScore> = scores.iter().filter(|s| s.level == EvolutionLevel::Elite).collect();

    let mut actions = Vec::new();
    for score in scores {
        let prev_composite = previous_map.get(score.agent_id.as_str()).copied();
        let trend = match prev_composite {
            Some(prev) => {
                let delta = score.composite - prev;
                if delta > 10.0 {
                    format!(" (↑ +{:.0} vs previous generation)", delta)
                } else if delta < -10.0 {
                    format!(" (↓ {:.0} vs previous generation)", delta)
                } else {
                    String::new()
                }
            }
            None => String::new(),
        };

        let action = match score.level {
            EvolutionLevel::Elite => EvolutionAction {
                agent_id: score.agent_id.clone(),
                action: EvolutionActionKind::Promote,
                reason: format!("Fitness score {:.0}% — exemplary agent{}", score.composite, trend),
                detail: "Replicate this agent's patterns into the fragile ones.".to_string(),
                source_agents: Vec::new(),
            },
            EvolutionLevel::Viable => {
                let (weakest, value) = score.dimensions.weakest();
                EvolutionAction {
                    agent_id: score.agent_id.clone(),
                    action: EvolutionActionKind::Observe,
                    reason: format!(
                        "Score {:.0}% viable, weak dimension: {} ({:.0}){}",
                        score.composite, weakest, value, trend
                    ),
                    detail: format!("Improve the '{}' dimension to reach ELITE.", weakest),
                    source_agents: Vec::new(),
                }
            }
            EvolutionLevel::Fragile => {
                let (weakest, value) = score.dimensions.weakest();
                if let Some(best_elite) = elites.iter().max_by(|a, b| {
                    a.dimensions
                        .get(weakest)
                        .partial_cmp(&b.dimensions.get(weakest))
                        .unwrap_or(std::cmp::Ordering::Equal)
                }) {
                    EvolutionAction {
                        agent_id: score.agent_id.clone(),
                        action: EvolutionActionKind::Hybridize,
                        reason: format!(
                            "Score {:.0}% fragile, critical dimension: {} ({:.0}){}",
                            score.composite, weakest, value, trend
                        ),
                        detail: format!("Hybridize with {} (expert in {}).", best_elite.agent_id, weakest),
                        source_agents: vec![best_elite.agent_id.clone()],
                    }
                } else {
                    EvolutionAction {
                        agent_id: score.agent_id.clone(),
                        action: EvolutionActionKind::Improve,
                        reason: format!(
                            "Score {:.0}% fragile, critical dimension: {} ({:.0}){}",
                            score.composite, weakest, value, trend
                        ),
                        detail: "Strengthen this agent's protocols and rules.".to_string(),
                        source_agents: Vec::new(),
                    }
                }
            }
            EvolutionLevel::Obsolete => {
                if prev_composite.is_some_and(|prev| prev >= 20.0) {
                    EvolutionAction {
                        agent_id: score.agent_id.clone(),
                        action: EvolutionActionKind::Deprecate,
                        reason: format!(
                            "Score {:.0}% obsolete — declining since the previous generation{}",
                            score.composite, trend
                        ),
                        detail: "Consider merging into a viable agent, or removal.".to_string(),
                        source_agents: Vec::new(),
                    }
                } else {
                    EvolutionAction {
                        agent_id: score.agent_id.clone(),
                        action: EvolutionActionKind::Deprecate,
                        reason: format!("Score {:.0}% obsolete — inactive or ineffective", score.composite),
                        detail: "Deprecation candidate. Check for a relevant niche before removal."
                            .to_string(),
                        source_agents: Vec::new(),
                    }
                }
            }
        };
        actions.push(action);
    }

    actions
}

// ============================================================================
// HISTORY
// ============================================================================

/// Load the generation history; missing or corrupt files yield an empty one.
pub fn load_history(paths: &ProjectPaths) -> Vec<GenerationRecord> {
    read_json(&paths.darwinism_history()).unwrap_or_default()
}

/// Persist the full history atomically.
pub fn save_history(paths: &ProjectPaths, history: &[GenerationRecord]) -> Result<()> {
    write_json_atomic(&paths.darwinism_history(), &history)
}

/// Scores of the latest recorded generation, if any.
pub fn previous_scores(history: &[GenerationRecord]) -> Option<Vec<FitnessScore>> {
    history.last().map(|record| record.scores.clone())
}

fn summarize(scores: &[FitnessScore]) -> GenerationSummary {
    let mut summary = GenerationSummary {
        agents_evaluated: scores.len(),
        ..Default::default()
    };
    for score in scores {
        match score.level {
            EvolutionLevel::Elite => summary.elite += 1,
            EvolutionLevel::Viable => summary.viable += 1,
            EvolutionLevel::Fragile => summary.fragile += 1,
            EvolutionLevel::Obsolete => summary.obsolete += 1,
        }
    }
    if !scores.is_empty() {
        summary.avg_fitness =
            round1(scores.iter().map(|s| s.composite).sum::<f64>() / scores.len() as f64);
    }
    summary
}

/// One full evaluation pass. Appends a generation record unless `dry_run`;
/// generation numbers are strictly monotonic per project (1, 2, 3, …).
pub fn evaluate_generation(
    paths: &ProjectPaths,
    since: Option<&str>,
    dry_run: bool,
) -> Result<(Vec<FitnessScore>, Vec<EvolutionAction>)> {
    let stats = parse_trace_stats(&paths.trace(), since);
    let external = count_agent_learnings(paths);

    let mut history = load_history(paths);
    let generation = history.last().map(|g| g.generation + 1).unwrap_or(1);

    let scores: Vec<FitnessScore> = stats
        .values()
        .map(|agent_stats| {
            let external_count = external.get(&agent_stats.agent_id).copied().unwrap_or(0);
            compute_fitness(agent_stats, external_count, generation)
        })
        .collect();

    let previous = previous_scores(&history);
    let actions = propose_actions(&scores, previous.as_deref());

    if !dry_run && !scores.is_empty() {
        let record = GenerationRecord {
            generation,
            timestamp: Utc::now().to_rfc3339(),
            scores: scores.clone(),
            actions: actions.clone(),
            summary: summarize(&scores),
        };
        history.push(record);
        save_history(paths, &history)?;
    }

    Ok((scores, actions))
}

// ============================================================================
// RENDERING
// ============================================================================

/// Ranked table of all agents.
pub fn render_leaderboard(scores: &[FitnessScore]) -> String {
    let mut sorted: Vec<&FitnessScore> = scores.iter().collect();
    sorted.sort_by(|a, b| b.composite.partial_cmp(&a.composite).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines = vec![
        "# 🏆 Darwinian Leaderboard".to_string(),
        String::new(),
        "| Rank | Agent | Fitness | Level | Reliability | Productivity | Learning | Adaptability | Resilience | Influence |".to_string(),
        "|------|-------|---------|-------|-------------|--------------|----------|--------------|------------|-----------|".to_string(),
    ];

    for (rank, score) in sorted.iter().enumerate() {
        let d = &score.dimensions;
        lines.push(format!(
            "| {} | {} | {:.0} | {} {} | {:.0} | {:.0} | {:.0} | {:.0} | {:.0} | {:.0} |",
            rank + 1,
            score.agent_id,
            score.composite,
            score.level.icon(),
            score.level,
            d.reliability,
            d.productivity,
            d.learning,
            d.adaptability,
            d.resilience,
            d.influence,
        ));
    }

    if !scores.is_empty() {
        let avg = scores.iter().map(|s| s.composite).sum::<f64>() / scores.len() as f64;
        lines.push(String::new());
        lines.push(format!("**Average fitness**: {:.1}/100", avg));
    }

    lines.join("\n")
}

/// Per-agent evaluation report.
pub fn render_evaluate(scores: &[FitnessScore], generation: u32) -> String {
    let mut lines = vec![
        format!("# 🧬 Darwinian Evaluation — Generation {}", generation),
        String::new(),
        format!("> {} agent(s) evaluated", scores.len()),
        String::new(),
    ];

    let mut sorted: Vec<&FitnessScore> = scores.iter().collect();
    sorted.sort_by(|a, b| b.composite.partial_cmp(&a.composite).unwrap_or(std::cmp::Ordering::Equal));
    for score in sorted {
        let d = &score.dimensions;
        lines.push(format!(
            "## {} {} — {:.0}/100 ({})",
            score.level.icon(),
            score.agent_id,
            score.composite,
            score.level
        ));
        lines.extend([
            String::new(),
            "| Dimension | Score |".to_string(),
            "|-----------|-------|".to_string(),
            format!("| Reliability | {:.0} |", d.reliability),
            format!("| Productivity | {:.0} |", d.productivity),
            format!("| Learning | {:.0} |", d.learning),
            format!("| Adaptability | {:.0} |", d.adaptability),
            format!("| Resilience | {:.0} |", d.resilience),
            format!("| Influence | {:.0} |", d.influence),
            String::new(),
        ]);
    }

    lines.join("\n")
}

/// Proposed evolutionary actions.
pub fn render_evolve(actions: &[EvolutionAction], dry_run: bool) -> String {
    let prefix = if dry_run { "🔍 DRY RUN — " } else { "" };
    let mut lines = vec![format!("# {}🧬 Evolutionary Actions", prefix), String::new()];

    if actions.is_empty() {
        lines.push("No action to propose.".to_string());
        return lines.join("\n");
    }

    let mut sorted: Vec<&EvolutionAction> = actions.iter().collect();
    sorted.sort_by_key(|a| a.action.as_str());
    for action in sorted {
        lines.push(format!("## {} {} → {}", action.action.icon(), action.agent_id, action.action));
        lines.push(String::new());
        lines.push(format!("**Reason**: {}", action.reason));
        lines.push(String::new());
        lines.push(action.detail.clone());
        lines.push(String::new());
        if !action.source_agents.is_empty() {
            lines.push(format!("Sources: {}", action.source_agents.join(", ")));
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Generation history table.
pub fn render_history(history: &[GenerationRecord]) -> String {
    if history.is_empty() {
        return "No darwinian history available.".to_string();
    }

    let mut lines = vec![
        "# 📜 Darwinian History".to_string(),
        String::new(),
        "| Gen | Date | Agents | Avg fitness | Elite | Viable | Fragile | Obsolete |".to_string(),
        "|-----|------|--------|-------------|-------|--------|---------|----------|".to_string(),
    ];

    for record in history {
        let date = if record.timestamp.len() >= 10 { &record.timestamp[..10] } else { "?" };
        let s = &record.summary;
        lines.push(format!(
            "| {} | {} | {} | {:.1} | {} | {} | {} | {} |",
            record.generation, date, s.agents_evaluated, s.avg_fitness, s.elite, s.viable, s.fragile, s.obsolete
        ));
    }

    lines.join("\n")
}

/// One agent's evolution across generations.
pub fn render_lineage(agent_id: &str, history: &[GenerationRecord]) -> String {
    let mut lines = vec![format!("# 📈 Lineage of '{}'", agent_id), String::new()];

    let points: Vec<(&GenerationRecord, &FitnessScore)> = history
        .iter()
        .flat_map(|record| {
            record
                .scores
                .iter()
                .filter(|s| s.agent_id.eq_ignore_ascii_case(agent_id))
                .map(move |s| (record, s))
        })
        .collect();

    if points.is_empty() {
        lines.push(format!("No data found for agent '{}'.", agent_id));
        return lines.join("\n");
    }

    lines.extend([
        "| Gen | Date | Fitness | Level | Rel. | Prod. | Learn. | Adapt. | Resil. | Infl. |".to_string(),
        "|-----|------|---------|-------|------|-------|--------|--------|--------|-------|".to_string(),
    ]);
    for (record, score) in &points {
        let date = if record.timestamp.len() >= 10 { &record.timestamp[..10] } else { "?" };
        let d = &score.dimensions;
        lines.push(format!(
            "| {} | {} | {:.0} | {} {} | {:.0} | {:.0} | {:.0} | {:.0} | {:.0} | {:.0} |",
            score.generation,
            date,
            score.composite,
            score.level.icon(),
            score.level,
            d.reliability,
            d.productivity,
            d.learning,
            d.adaptability,
            d.resilience,
            d.influence,
        ));
    }

    if points.len() >= 2 {
        let first = points.first().unwrap().1;
        let last = points.last().unwrap().1;
        let delta = last.composite - first.composite;
        let trend = if delta > 0.0 { "↑" } else if delta < 0.0 { "↓" } else { "→" };
        lines.push(String::new());
        lines.push(format!(
            "**Trend**: {} {:+.0} (Gen.{} → Gen.{})",
            trend, delta, first.generation, last.generation
        ));
    }

    lines.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================
