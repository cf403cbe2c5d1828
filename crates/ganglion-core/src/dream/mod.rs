//! Dream engine
//!
//! Off-session consolidation: re-reads learnings, decisions, trace, failure
//! museum, shared context and the pheromone board, and produces
//! cross-domain insights no single agent would have formulated in session.
//!
//! Four passes feed one pipeline:
//! 1. **Cross-connections** — similar entries across sources of different
//!    kinds (O(n²), skipped in quick mode).
//! 2. **Recurring patterns** — keywords spanning several sources.
//! 3. **Tensions** — prescriptive entries colliding with warnings from a
//!    different source (O(n²), skipped in quick mode).
//! 4. **Opportunities** — improvement markers (TODO, "not yet", …).
//!
//! Then: validation → temporal decay → deduplication → ranking → cap.
//! Surviving insights are diffed against the persistent dream memory and
//! optionally re-enter the board as pheromones (the stigmergy bridge).

pub mod journal;
pub mod memory;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::sources::{MemorySource, collect_sources};
use crate::memory::{ProjectPaths, Result};
use crate::similarity::{similarity, truncate_chars};
use crate::stigmergy::{self, PheromoneType};

use self::memory::{DreamDiff, DreamMemory};

/// Insight cap for a full dream.
pub const MAX_INSIGHTS: usize = 12;
/// Insight cap in quick mode.
pub const QUICK_MAX_INSIGHTS: usize = 5;
/// A recurring pattern must span at least this many distinct sources.
pub const MIN_SOURCES: usize = 2;
/// Cross-connection similarity threshold.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;
/// Confidence bonus for an insight seen across consecutive sessions.
pub const PERSISTENCE_BOOST: f64 = 0.15;
/// Half-life of the temporal weighting, in days.
pub const DECAY_HALFLIFE_DAYS: f64 = 14.0;

/// Prescriptive markers ("this must hold").
const TENSION_POSITIVE_MARKERS: &[&str] = &[
    "toujours", "always", "must", "doit", "jamais", "never",
    "obligatoire", "required", "important", "critical",
];

/// Warning markers ("this went wrong / avoid").
const TENSION_NEGATIVE_MARKERS: &[&str] = &[
    "éviter", "avoid", "ne pas", "never", "jamais", "danger",
    "risque", "problème", "échec", "fail", "broken", "cassé",
];

/// Improvement markers for the opportunity pass.
const OPPORTUNITY_MARKERS: &[&str] = &[
    "todo", "à améliorer", "could be better", "improvement", "optimiser",
    "refactorer", "simplifier", "automatiser", "manque", "missing",
    "pas encore", "not yet", "futur", "future", "éventuellement",
];

// ============================================================================
// INSIGHTS
// ============================================================================

/// Insight categories. Spellings persist in dream-memory.json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Pattern,
    Tension,
    Opportunity,
    Connection,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Pattern => "pattern",
            InsightCategory::Tension => "tension",
            InsightCategory::Opportunity => "opportunity",
            InsightCategory::Connection => "connection",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            InsightCategory::Pattern => "🔄",
            InsightCategory::Tension => "⚡",
            InsightCategory::Opportunity => "💡",
            InsightCategory::Connection => "🔗",
        }
    }

    /// Pheromone type an insight of this category converts into.
    pub fn pheromone_type(&self) -> PheromoneType {
        match self {
            InsightCategory::Tension => PheromoneType::Alert,
            InsightCategory::Opportunity => PheromoneType::Opportunity,
            InsightCategory::Connection => PheromoneType::Progress,
            InsightCategory::Pattern => PheromoneType::Need,
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One emergent observation anchored in the collected sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreamInsight {
    pub title: String,
    pub description: String,
    /// Names of the contributing sources.
    pub sources: Vec<String>,
    pub category: InsightCategory,
    pub confidence: f64,
    #[serde(default)]
    pub agents_relevant: Vec<String>,
    #[serde(default)]
    pub actionable: bool,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

// ============================================================================
// ANALYSIS PASSES
// ============================================================================

/// Cross-source connections: similar entries in sources of different kinds.
pub fn find_cross_connections(sources: &[MemorySource]) -> Vec<DreamInsight> {
    let mut insights = Vec::new();

    for (i, src_a) in sources.iter().enumerate() {
        for src_b in sources.iter().skip(i + 1) {
            if src_a.kind == src_b.kind {
                continue;
            }
            for entry_a in &src_a.entries {
                for entry_b in &src_b.entries {
                    let sim = similarity(&entry_a.text, &entry_b.text);
                    if sim >= SIMILARITY_THRESHOLD {
                        insights.push(DreamInsight {
                            title: format!("Connection {} ↔ {}", src_a.kind, src_b.kind),
                            description: format!(
                                "Shared pattern between [{}] and [{}]:\n  • {}...\n  • {}...",
                                src_a.name,
                                src_b.name,
                                truncate_chars(&entry_a.text, 120),
                                truncate_chars(&entry_b.text, 120)
                            ),
                            sources: vec![src_a.name.clone(), src_b.name.clone()],
                            category: InsightCategory::Connection,
                            confidence: round2(sim),
                            agents_relevant: Vec::new(),
                            actionable: false,
                        });
                    }
                }
            }
        }
    }

    insights
}

/// Keywords recurring across several sources.
pub fn find_recurring_patterns(sources: &[MemorySource]) -> Vec<DreamInsight> {
    // keyword → (source names with repeats, sample entries)
    let mut occurrences: BTreeMap<String, (Vec<String>, Vec<String>)> = BTreeMap::new();

    for src in sources {
        for entry in &src.entries {
            for keyword in crate::similarity::extract_keywords(&entry.text) {
                let slot = occurrences.entry(keyword).or_default();
                slot.0.push(src.name.clone());
                slot.1.push(entry.text.clone());
            }
        }
    }

    let mut insights = Vec::new();
    for (keyword, (source_names, entries)) in occurrences {
        let mut unique_sources = source_names.clone();
        unique_sources.sort_unstable();
        unique_sources.dedup();

        if unique_sources.len() >= MIN_SOURCES && source_names.len() >= 3 {
            let samples: Vec<String> = entries
                .iter()
                .take(3)
                .map(|e| format!("  • {}...", truncate_chars(e, 100)))
                .collect();
            insights.push(DreamInsight {
                title: format!("Recurring pattern: '{}'", keyword),
                description: format!(
                    "The term '{}' appears in {} sources ({} occurrences):\n{}",
                    keyword,
                    unique_sources.len(),
                    source_names.len(),
                    samples.join("\n")
                ),
                confidence: (0.3 + 0.1 * unique_sources.len() as f64).min(0.9),
                sources: unique_sources,
                category: InsightCategory::Pattern,
                agents_relevant: Vec::new(),
                actionable: false,
            });
        }
    }

    insights
}

fn contains_any(text_lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text_lower.contains(m))
}

/// Prescriptive entries colliding with warnings from a different source.
pub fn find_tensions(sources: &[MemorySource]) -> Vec<DreamInsight> {
    let mut positive: Vec<(&str, &str)> = Vec::new(); // (source name, entry)
    let mut negative: Vec<(&str, &str)> = Vec::new();

    for src in sources {
        for entry in &src.entries {
            let lower = entry.text.to_lowercase();
            if contains_any(&lower, TENSION_POSITIVE_MARKERS) {
                positive.push((&src.name, &entry.text));
            }
            if contains_any(&lower, TENSION_NEGATIVE_MARKERS) {
                negative.push((&src.name, &entry.text));
            }
        }
    }

    let mut insights = Vec::new();
    for (pos_src, pos_entry) in &positive {
        for (neg_src, neg_entry) in &negative {
            if pos_src == neg_src {
                continue;
            }
            let sim = similarity(pos_entry, neg_entry);
            if sim >= 0.3 {
                insights.push(DreamInsight {
                    title: format!("Tension between {} and {}", pos_src, neg_src),
                    description: format!(
                        "Possible contradiction on the same topic:\n  ✅ [{}] {}...\n  ❌ [{}] {}...",
                        pos_src,
                        truncate_chars(pos_entry, 120),
                        neg_src,
                        truncate_chars(neg_entry, 120)
                    ),
                    sources: vec![pos_src.to_string(), neg_src.to_string()],
                    category: InsightCategory::Tension,
                    confidence: round2(sim + 0.1),
                    agents_relevant: Vec::new(),
                    actionable: false,
                });
            }
        }
    }

    insights
}

/// Entries carrying an improvement marker. One insight per entry at most.
pub fn find_opportunities(sources: &[MemorySource]) -> Vec<DreamInsight> {
    let mut insights = Vec::new();

    for src in sources {
        for entry in &src.entries {
            let lower = entry.text.to_lowercase();
            if contains_any(&lower, OPPORTUNITY_MARKERS) {
                insights.push(DreamInsight {
                    title: format!("Opportunity in {}", src.name),
                    description: format!("Improvement signal: {}", truncate_chars(&entry.text, 150)),
                    sources: vec![src.name.clone()],
                    category: InsightCategory::Opportunity,
                    confidence: 0.5,
                    agents_relevant: Vec::new(),
                    actionable: true,
                });
            }
        }
    }

    insights
}

// ============================================================================
// VALIDATION / DECAY / DEDUP
// ============================================================================

/// An insight must be anchored in the collected sources: at least one
/// source, all referenced sources collected, positive confidence, a real
/// description.
pub fn validate_insight(insight: &DreamInsight, sources: &[MemorySource]) -> bool {
    if insight.sources.is_empty() {
        return false;
    }
    if !insight
        .sources
        .iter()
        .all(|name| sources.iter().any(|s| &s.name == name))
    {
        return false;
    }
    if insight.confidence <= 0.0 {
        return false;
    }
    insight.description.chars().count() >= 10
}

/// Temporal weight of one dated entry: 1.0 today, halving every
/// [`DECAY_HALFLIFE_DAYS`], floored at 0.3 so an old entry is never fully
/// ignored. Empty or invalid dates carry no penalty.
fn temporal_weight(date: &str, today: NaiveDate) -> f64 {
    if date.len() < 10 {
        return 1.0;
    }
    let Ok(entry_date) = NaiveDate::parse_from_str(&date[..10], "%Y-%m-%d") else {
        return 1.0;
    };
    let age_days = (today - entry_date).num_days().max(0);
    if age_days == 0 {
        return 1.0;
    }
    let weight = 2.0_f64.powf(-(age_days as f64) / DECAY_HALFLIFE_DAYS);
    round3(weight).max(0.3)
}

/// Weight each insight's confidence by the average temporal weight of its
/// contributing sources (average over each source's dated entries).
pub fn apply_temporal_decay(insights: &mut [DreamInsight], sources: &[MemorySource], today: NaiveDate) {
    for insight in insights.iter_mut() {
        let mut weights = Vec::new();
        for name in &insight.sources {
            let Some(src) = sources.iter().find(|s| &s.name == name) else {
                continue;
            };
            let entry_weights: Vec<f64> = src
                .dates()
                .filter(|d| !d.is_empty())
                .map(|d| temporal_weight(d, today))
                .collect();
            if !entry_weights.is_empty() {
                weights.push(entry_weights.iter().sum::<f64>() / entry_weights.len() as f64);
            }
        }
        if !weights.is_empty() {
            let avg = weights.iter().sum::<f64>() / weights.len() as f64;
            insight.confidence = round3(insight.confidence * avg);
        }
    }
}

/// Drop near-identical insights, keeping the higher-confidence one.
pub fn deduplicate_insights(insights: Vec<DreamInsight>) -> Vec<DreamInsight> {
    let mut unique: Vec<DreamInsight> = Vec::new();
    for insight in insights {
        let mut is_duplicate = false;
        for existing in unique.iter_mut() {
            if similarity(&insight.description, &existing.description) > 0.7 {
                if insight.confidence > existing.confidence {
                    *existing = insight.clone();
                }
                is_duplicate = true;
                break;
            }
        }
        if !is_duplicate {
            unique.push(insight);
        }
    }
    unique
}

// ============================================================================
// PIPELINE
// ============================================================================

/// One full or quick dream over pre-collected sources.
///
/// Quick mode keeps only the O(n) passes (patterns + opportunities) and the
/// lower cap — it backs high-frequency triggers such as post-commit hooks.
pub fn dream(
    sources: &[MemorySource],
    validate: bool,
    quick: bool,
    today: NaiveDate,
) -> Vec<DreamInsight> {
    if sources.is_empty() {
        return Vec::new();
    }

    let mut insights = Vec::new();
    if !quick {
        insights.extend(find_cross_connections(sources));
    }
    insights.extend(find_recurring_patterns(sources));
    if !quick {
        insights.extend(find_tensions(sources));
    }
    insights.extend(find_opportunities(sources));

    if validate {
        insights.retain(|i| validate_insight(i, sources));
    }

    apply_temporal_decay(&mut insights, sources, today);

    let mut insights = deduplicate_insights(insights);
    insights.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let cap = if quick { QUICK_MAX_INSIGHTS } else { MAX_INSIGHTS };
    insights.truncate(cap);
    insights
}

// ============================================================================
// STIGMERGY BRIDGE
// ============================================================================

/// Convert insights into pheromones on the board. Skips any insight whose
/// rendered text is already active on the board (cross-session dedup).
/// Returns the number of pheromones emitted; the board is saved only when
/// something was emitted.
pub fn emit_to_stigmergy(insights: &[DreamInsight], paths: &ProjectPaths) -> Result<usize> {
    let mut board = stigmergy::load_board(paths);
    let mut seen = stigmergy::active_texts(&board);
    let mut emitted = 0;

    for insight in insights {
        let location = insight
            .sources
            .first()
            .cloned()
            .unwrap_or_else(|| "system/dream".to_string());
        let text = format!(
            "[dream] {}: {}",
            insight.title,
            truncate_chars(&insight.description, 200)
        );
        if stigmergy::emit_unique(
            &mut board,
            insight.category.pheromone_type(),
            &location,
            &text,
            "dream-mode",
            vec!["auto-dream".to_string(), insight.category.as_str().to_string()],
            insight.confidence.min(0.9),
            &mut seen,
        ) {
            emitted += 1;
        }
    }

    if emitted > 0 {
        stigmergy::save_board(paths, &board)?;
    }
    Ok(emitted)
}

// ============================================================================
// FULL CYCLE
// ============================================================================

/// Options for one dream cycle.
#[derive(Debug, Clone, Default)]
pub struct DreamRunOptions {
    /// `YYYY-MM-DD`, or `auto` to resume from the last run stamp.
    pub since: Option<String>,
    pub agent: Option<String>,
    pub validate: bool,
    pub quick: bool,
    /// Render without touching dream memory, journal or the run stamp.
    pub dry_run: bool,
    /// Convert surviving insights into pheromones.
    pub emit: bool,
}

/// Everything a caller needs to report on one dream cycle.
#[derive(Debug)]
pub struct DreamOutcome {
    pub since: Option<String>,
    pub sources: Vec<MemorySource>,
    pub insights: Vec<DreamInsight>,
    pub diff: Option<DreamDiff>,
    pub emitted: usize,
    pub journal: Option<String>,
    pub journal_path: Option<PathBuf>,
}

impl DreamOutcome {
    pub fn total_entries(&self) -> usize {
        self.sources.iter().map(|s| s.entries.len()).sum()
    }
}

/// Run one complete dream cycle: collect, analyze, diff against dream
/// memory, optionally emit to the board, render and rotate the journal,
/// update the incremental stamp. The journal is written only when at least
/// one insight survived; an empty project leaves no trace on disk.
pub fn run_dream_cycle(paths: &ProjectPaths, options: &DreamRunOptions) -> Result<DreamOutcome> {
    let since = match options.since.as_deref() {
        Some("auto") => journal::read_last_dream_timestamp(paths),
        Some(date) => Some(date.to_string()),
        None => None,
    };

    let sources = collect_sources(paths, since.as_deref(), options.agent.as_deref());
    let today = Utc::now().date_naive();

    let mut outcome = DreamOutcome {
        since: since.clone(),
        sources,
        insights: Vec::new(),
        diff: None,
        emitted: 0,
        journal: None,
        journal_path: None,
    };
    if outcome.sources.is_empty() {
        return Ok(outcome);
    }

    // Quick mode always validates: it feeds automated triggers.
    let validate = options.validate || options.quick;
    let mut insights = dream(&outcome.sources, validate, options.quick, today);
    if insights.is_empty() {
        return Ok(outcome);
    }

    if !options.dry_run {
        let mut dream_memory = DreamMemory::load(paths);
        let diff = memory::update_dream_memory(&mut insights, &mut dream_memory, today);
        dream_memory.save(paths)?;
        outcome.diff = Some(diff);
    }

    if options.emit {
        outcome.emitted = emit_to_stigmergy(&insights, paths)?;
    }

    let rendered = journal::render_journal(
        &insights,
        &outcome.sources,
        since.as_deref(),
        outcome.diff.as_ref(),
    );
    let journal_path = journal::write_journal(&rendered, paths, options.dry_run)?;
    if !options.dry_run {
        journal::save_last_dream_timestamp(paths)?;
    }

    outcome.insights = insights;
    outcome.journal = Some(rendered);
    outcome.journal_path = Some(journal_path);
    Ok(outcome)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::sources::{SourceEntry, SourceKind};

    fn source(name: &str, kind: SourceKind, texts: &[&str]) -> MemorySource {
        MemorySource {
            name: name.to_string(),
            kind,
            entries: texts.iter().map(|t| SourceEntry::new("", *t)).collect(),
        }
    }

    fn dated_source(name: &str, kind: SourceKind, entries: &[(&str, &str)]) -> MemorySource {
        MemorySource {
            name: name.to_string(),
            kind,
            entries: entries.iter().map(|(d, t)| SourceEntry::new(*d, *t)).collect(),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn test_cross_connection_identical_entries() {
        let text = "database caching performance optimization layer";
        let sources = vec![
            source("learnings/dev.md", SourceKind::Learnings, &[text]),
            source("decisions-log.md", SourceKind::Decisions, &[text]),
        ];

        let insights = find_cross_connections(&sources);
        assert_eq!(insights.len(), 1);
        let insight = &insights[0];
        assert_eq!(insight.category, InsightCategory::Connection);
        assert_eq!(insight.confidence, 1.0);
        assert_eq!(insight.sources, vec!["learnings/dev.md", "decisions-log.md"]);
        assert!(validate_insight(insight, &sources));
    }

    #[test]
    fn test_cross_connection_skips_same_kind() {
        let text = "database caching performance optimization layer";
        let sources = vec![
            source("learnings/dev.md", SourceKind::Learnings, &[text]),
            source("learnings/qa.md", SourceKind::Learnings, &[text]),
        ];
        assert!(find_cross_connections(&sources).is_empty());
    }

    #[test]
    fn test_recurring_pattern_thresholds() {
        // "retry_logic" appears 3 times across 2 sources
        let sources = vec![
            source(
                "learnings/dev.md",
                SourceKind::Learnings,
                &["retry logic added everywhere", "retry logic again refined"],
            ),
            source("decisions-log.md", SourceKind::Decisions, &["standardize retry logic policy"]),
        ];

        let insights = find_recurring_patterns(&sources);
        let pattern = insights
            .iter()
            .find(|i| i.title.contains("retry_logic"))
            .expect("bigram pattern detected");
        assert_eq!(pattern.category, InsightCategory::Pattern);
        assert!((pattern.confidence - 0.5).abs() < 1e-9); // 0.3 + 0.1*2
        assert_eq!(pattern.sources.len(), 2);
    }

    #[test]
    fn test_pattern_requires_two_sources() {
        let sources = vec![source(
            "learnings/dev.md",
            SourceKind::Learnings,
            &["retry logic one", "retry logic two", "retry logic three"],
        )];
        assert!(find_recurring_patterns(&sources).is_empty());
    }

    #[test]
    fn test_tension_detection() {
        let sources = vec![
            source(
                "learnings/dev.md",
                SourceKind::Learnings,
                &["On doit toujours activer le cache agressif pour les données"],
            ),
            source(
                "failure-museum.md",
                SourceKind::FailureMuseum,
                &["Le cache agressif a causé des données périmées, éviter"],
            ),
        ];

        let insights = find_tensions(&sources);
        assert!(!insights.is_empty());
        let tension = &insights[0];
        assert_eq!(tension.category, InsightCategory::Tension);
        assert!(tension.confidence > 0.3);
        assert!(tension.description.contains("✅"));
        assert!(tension.description.contains("❌"));
    }

    #[test]
    fn test_tension_skips_same_source() {
        let sources = vec![source(
            "learnings/dev.md",
            SourceKind::Learnings,
            &["always enable the cache layer", "avoid the cache layer entirely"],
        )];
        assert!(find_tensions(&sources).is_empty());
    }

    #[test]
    fn test_opportunity_once_per_entry() {
        let sources = vec![source(
            "decisions-log.md",
            SourceKind::Decisions,
            &["TODO: automatiser le déploiement, not yet done"],
        )];
        let insights = find_opportunities(&sources);
        assert_eq!(insights.len(), 1);
        assert!(insights[0].actionable);
        assert_eq!(insights[0].confidence, 0.5);
    }

    #[test]
    fn test_validation_rules() {
        let sources = vec![source("learnings/dev.md", SourceKind::Learnings, &["entry"])];
        let base = DreamInsight {
            title: "t".into(),
            description: "long enough description".into(),
            sources: vec!["learnings/dev.md".into()],
            category: InsightCategory::Pattern,
            confidence: 0.5,
            agents_relevant: vec![],
            actionable: false,
        };
        assert!(validate_insight(&base, &sources));

        let mut bad = base.clone();
        bad.sources = vec![];
        assert!(!validate_insight(&bad, &sources));

        let mut bad = base.clone();
        bad.sources = vec!["ghost.md".into()];
        assert!(!validate_insight(&bad, &sources));

        let mut bad = base.clone();
        bad.confidence = 0.0;
        assert!(!validate_insight(&bad, &sources));

        let mut bad = base.clone();
        bad.description = "short".into();
        assert!(!validate_insight(&bad, &sources));
    }

    #[test]
    fn test_temporal_weight_bounds() {
        let today = today();
        assert_eq!(temporal_weight("", today), 1.0);
        assert_eq!(temporal_weight("garbage", today), 1.0);
        assert_eq!(temporal_weight(&today.format("%Y-%m-%d").to_string(), today), 1.0);

        let two_weeks = (today - chrono::Duration::days(14)).format("%Y-%m-%d").to_string();
        assert!((temporal_weight(&two_weeks, today) - 0.5).abs() < 1e-9);

        let ancient = (today - chrono::Duration::days(600)).format("%Y-%m-%d").to_string();
        assert_eq!(temporal_weight(&ancient, today), 0.3);
    }

    #[test]
    fn test_temporal_decay_scales_confidence() {
        let today = today();
        let old = (today - chrono::Duration::days(14)).format("%Y-%m-%d").to_string();
        let sources = vec![dated_source(
            "learnings/dev.md",
            SourceKind::Learnings,
            &[(old.as_str(), "entry")],
        )];
        let mut insights = vec![DreamInsight {
            title: "t".into(),
            description: "long enough description".into(),
            sources: vec!["learnings/dev.md".into()],
            category: InsightCategory::Pattern,
            confidence: 0.8,
            agents_relevant: vec![],
            actionable: false,
        }];

        apply_temporal_decay(&mut insights, &sources, today);
        assert!((insights[0].confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_dedup_keeps_higher_confidence() {
        let make = |conf: f64| DreamInsight {
            title: "t".into(),
            description: "database caching performance optimization layer insight".into(),
            sources: vec!["a".into()],
            category: InsightCategory::Connection,
            confidence: conf,
            agents_relevant: vec![],
            actionable: false,
        };
        let deduped = deduplicate_insights(vec![make(0.4), make(0.9)]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence, 0.9);
    }

    #[test]
    fn test_dream_empty_sources() {
        assert!(dream(&[], true, false, today()).is_empty());
    }

    #[test]
    fn test_quick_mode_skips_quadratic_passes() {
        let text = "database caching performance optimization layer";
        let sources = vec![
            source("learnings/dev.md", SourceKind::Learnings, &[text]),
            source("decisions-log.md", SourceKind::Decisions, &[text]),
        ];

        let full = dream(&sources, true, false, today());
        assert!(full.iter().any(|i| i.category == InsightCategory::Connection));

        let quick = dream(&sources, true, true, today());
        assert!(!quick.iter().any(|i| i.category == InsightCategory::Connection));
        assert!(quick.len() <= QUICK_MAX_INSIGHTS);
    }

    #[test]
    fn test_dream_caps_and_ranks() {
        // Many opportunity entries produce many insights; cap applies and
        // ordering is by confidence descending.
        let texts: Vec<String> = (0..20)
            .map(|i| format!("TODO improve subsystem number {} pipeline", i))
            .collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let sources = vec![
            source("decisions-log.md", SourceKind::Decisions, &refs),
            source(
                "learnings/dev.md",
                SourceKind::Learnings,
                &["database caching performance optimization layer"],
            ),
            source(
                "failure-museum.md",
                SourceKind::FailureMuseum,
                &["database caching performance optimization layer"],
            ),
        ];

        let insights = dream(&sources, true, false, today());
        assert!(insights.len() <= MAX_INSIGHTS);
        for pair in insights.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        // The exact-match connection outranks the 0.5-confidence opportunities
        assert_eq!(insights[0].category, InsightCategory::Connection);
    }

    #[test]
    fn test_emit_to_stigmergy_mapping_and_dedup() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let insights = vec![DreamInsight {
            title: "Connection learnings ↔ decisions".into(),
            description: "database caching performance optimization layer shared".into(),
            sources: vec!["learnings/dev.md".into()],
            category: InsightCategory::Connection,
            confidence: 1.0,
            agents_relevant: vec![],
            actionable: false,
        }];

        let emitted = emit_to_stigmergy(&insights, &paths).unwrap();
        assert_eq!(emitted, 1);

        let board = stigmergy::load_board(&paths);
        let p = &board.pheromones[0];
        assert_eq!(p.pheromone_type, PheromoneType::Progress);
        assert!(p.text.starts_with("[dream]"));
        assert_eq!(p.emitter, "dream-mode");
        assert!(p.intensity <= 0.9);
        assert_eq!(p.tags, vec!["auto-dream", "connection"]);
        assert_eq!(p.location, "learnings/dev.md");

        // Second emission with identical text is deduplicated
        let emitted = emit_to_stigmergy(&insights, &paths).unwrap();
        assert_eq!(emitted, 0);
        assert_eq!(stigmergy::load_board(&paths).pheromones.len(), 1);
    }

    #[test]
    fn test_run_dream_cycle_empty_project_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let outcome = run_dream_cycle(&paths, &DreamRunOptions::default()).unwrap();
        assert!(outcome.insights.is_empty());
        assert!(!paths.dream_journal().exists());
        assert!(!paths.dream_memory().exists());
    }
}
