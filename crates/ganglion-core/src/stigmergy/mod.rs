//! Stigmergic coordination board
//!
//! Digital pheromones: agents deposit typed signals in the environment,
//! other agents sense them and adapt. No direct communication — the board
//! is the medium.
//!
//! Signal types:
//! - **NEED** — review, expertise or clarification wanted
//! - **ALERT** — danger (breaking change, tech debt, security)
//! - **OPPORTUNITY** — potential improvement
//! - **PROGRESS** — work in flight
//! - **COMPLETE** — work finished, ready for hand-off
//! - **BLOCK** — blocked, waiting on resolution
//!
//! Mechanics:
//! - Evaporation: `current = base × 0.5^(age_hours / half_life_hours)`.
//!   The base intensity is immutable; only amplification changes it.
//! - Amplification: each reinforcement adds 0.2, capped at 1.0.
//! - Detection threshold: signals below 0.05 current intensity are
//!   invisible to `sense` and removed by `evaporate`.

pub mod trails;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::memory::{ProjectPaths, Result, read_json, write_json_atomic};

/// Board schema version.
pub const STIGMERGY_VERSION: &str = "1.0.0";

/// Hours for a signal to lose half its intensity.
pub const DEFAULT_HALF_LIFE_HOURS: f64 = 72.0;
/// Signals below this current intensity are invisible.
pub const DETECTION_THRESHOLD: f64 = 0.05;
/// Intensity added per amplification.
pub const REINFORCEMENT_BOOST: f64 = 0.2;
/// Intensity ceiling.
pub const MAX_INTENSITY: f64 = 1.0;
/// Intensity used when the emitter does not specify one.
pub const DEFAULT_INTENSITY: f64 = 0.7;

// ============================================================================
// PHEROMONE TYPES
// ============================================================================

/// Closed set of signal types. Spellings are persisted in the board JSON
/// and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PheromoneType {
    #[default]
    Need,
    Alert,
    Opportunity,
    Progress,
    Complete,
    Block,
}

impl PheromoneType {
    /// All types, in display order.
    pub const ALL: [PheromoneType; 6] = [
        PheromoneType::Need,
        PheromoneType::Alert,
        PheromoneType::Opportunity,
        PheromoneType::Progress,
        PheromoneType::Complete,
        PheromoneType::Block,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PheromoneType::Need => "NEED",
            PheromoneType::Alert => "ALERT",
            PheromoneType::Opportunity => "OPPORTUNITY",
            PheromoneType::Progress => "PROGRESS",
            PheromoneType::Complete => "COMPLETE",
            PheromoneType::Block => "BLOCK",
        }
    }

    /// Parse from the persisted spelling. Unknown names map to NEED.
    pub fn parse_name(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ALERT" => PheromoneType::Alert,
            "OPPORTUNITY" => PheromoneType::Opportunity,
            "PROGRESS" => PheromoneType::Progress,
            "COMPLETE" => PheromoneType::Complete,
            "BLOCK" => PheromoneType::Block,
            _ => PheromoneType::Need,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PheromoneType::Need => "🔵",
            PheromoneType::Alert => "🔴",
            PheromoneType::Opportunity => "🟢",
            PheromoneType::Progress => "🟡",
            PheromoneType::Complete => "✅",
            PheromoneType::Block => "🚧",
        }
    }
}

impl std::fmt::Display for PheromoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PHEROMONE
// ============================================================================

/// One coordination signal on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pheromone {
    pub pheromone_id: String,
    pub pheromone_type: PheromoneType,
    /// Affected zone: file, domain or feature.
    pub location: String,
    pub text: String,
    pub emitter: String,
    /// Emission timestamp, ISO-8601 UTC. Kept as a string so a corrupt
    /// board entry degrades instead of failing to load.
    pub timestamp: String,
    /// Base intensity in [0, 1]. Never decayed in place.
    pub intensity: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reinforcements: u32,
    #[serde(default)]
    pub reinforced_by: Vec<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_by: String,
    #[serde(default)]
    pub resolved_at: String,
}

// ============================================================================
// BOARD
// ============================================================================

/// The project's pheromone board. Rewritten as a whole on each mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PheromoneBoard {
    pub version: String,
    pub half_life_hours: f64,
    pub pheromones: Vec<Pheromone>,
    pub total_emitted: u64,
    pub total_evaporated: u64,
}

impl Default for PheromoneBoard {
    fn default() -> Self {
        Self {
            version: STIGMERGY_VERSION.to_string(),
            half_life_hours: DEFAULT_HALF_LIFE_HOURS,
            pheromones: Vec::new(),
            total_emitted: 0,
            total_evaporated: 0,
        }
    }
}

impl PheromoneBoard {
    pub fn find(&self, pheromone_id: &str) -> Option<&Pheromone> {
        self.pheromones.iter().find(|p| p.pheromone_id == pheromone_id)
    }
}

/// Load the board; missing or corrupt files yield an empty board.
pub fn load_board(paths: &ProjectPaths) -> PheromoneBoard {
    read_json(&paths.pheromone_board()).unwrap_or_default()
}

/// Persist the board atomically.
pub fn save_board(paths: &ProjectPaths, board: &PheromoneBoard) -> Result<()> {
    write_json_atomic(&paths.pheromone_board(), board)
}

// ============================================================================
// ID GENERATION
// ============================================================================

/// Deterministic short id: same (type, location, text, timestamp) always
/// yields the same id.
fn generate_id(ptype: PheromoneType, location: &str, text: &str, timestamp: &str) -> String {
    let raw = format!("{}:{}:{}:{}", ptype.as_str(), location, text, timestamp);
    let digest = Sha256::digest(raw.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("PH-{}", &hex[..8])
}

fn clamp_round(intensity: f64) -> f64 {
    let clamped = intensity.clamp(0.0, MAX_INTENSITY);
    (clamped * 10_000.0).round() / 10_000.0
}

// ============================================================================
// EVAPORATION
// ============================================================================

/// Current intensity after evaporation, as a pure function of the base
/// intensity, the emission timestamp, the half-life and `now`. Invalid or
/// future timestamps return the base intensity unchanged.
pub fn compute_current_intensity(
    pheromone: &Pheromone,
    half_life_hours: f64,
    now: DateTime<Utc>,
) -> f64 {
    let Some(emitted) = parse_timestamp(&pheromone.timestamp) else {
        return pheromone.intensity;
    };
    let age_hours = (now - emitted).num_seconds() as f64 / 3600.0;
    if age_hours <= 0.0 {
        return pheromone.intensity;
    }
    pheromone.intensity * 0.5_f64.powf(age_hours / half_life_hours)
}

/// Parse an ISO-8601 timestamp, tolerating naive (offset-less) values,
/// which are read as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Remove signals below the detection threshold as well as resolved ones.
/// Returns the number dropped; `total_evaporated` grows by the same amount.
pub fn evaporate(board: &mut PheromoneBoard, now: DateTime<Utc>) -> usize {
    let half_life = board.half_life_hours;
    let before = board.pheromones.len();
    board
        .pheromones
        .retain(|p| !p.resolved && compute_current_intensity(p, half_life, now) >= DETECTION_THRESHOLD);
    let evaporated = before - board.pheromones.len();
    board.total_evaporated += evaporated as u64;
    evaporated
}

// ============================================================================
// ACTIONS
// ============================================================================

/// Deposit a pheromone on the board.
pub fn emit_pheromone(
    board: &mut PheromoneBoard,
    ptype: PheromoneType,
    location: &str,
    text: &str,
    emitter: &str,
    tags: Vec<String>,
    intensity: f64,
) -> Pheromone {
    let now = Utc::now().to_rfc3339();
    emit_pheromone_at(board, ptype, location, text, emitter, tags, intensity, &now)
}

/// Deposit with an explicit timestamp. Split out so tests and replays can
/// control the clock.
#[allow(clippy::too_many_arguments)]
pub fn emit_pheromone_at(
    board: &mut PheromoneBoard,
    ptype: PheromoneType,
    location: &str,
    text: &str,
    emitter: &str,
    tags: Vec<String>,
    intensity: f64,
    timestamp: &str,
) -> Pheromone {
    let pheromone = Pheromone {
        pheromone_id: generate_id(ptype, location, text, timestamp),
        pheromone_type: ptype,
        location: location.to_string(),
        text: text.to_string(),
        emitter: emitter.to_string(),
        timestamp: timestamp.to_string(),
        intensity: clamp_round(intensity),
        tags,
        reinforcements: 0,
        reinforced_by: Vec::new(),
        resolved: false,
        resolved_by: String::new(),
        resolved_at: String::new(),
    };
    board.pheromones.push(pheromone.clone());
    board.total_emitted += 1;
    pheromone
}

/// Reinforce an existing pheromone: +0.2 intensity (capped at 1.0), one
/// more reinforcement, the agent unioned into `reinforced_by`.
/// Returns `None` when the id is unknown.
pub fn amplify_pheromone<'a>(
    board: &'a mut PheromoneBoard,
    pheromone_id: &str,
    agent: &str,
) -> Option<&'a Pheromone> {
    let p = board.pheromones.iter_mut().find(|p| p.pheromone_id == pheromone_id)?;
    p.intensity = clamp_round(p.intensity + REINFORCEMENT_BOOST);
    p.reinforcements += 1;
    if !p.reinforced_by.iter().any(|a| a == agent) {
        p.reinforced_by.push(agent.to_string());
    }
    Some(p)
}

/// Mark a pheromone resolved. The record stays on the board (cold-zone
/// detection needs it) but default sensing excludes it forever.
pub fn resolve_pheromone<'a>(
    board: &'a mut PheromoneBoard,
    pheromone_id: &str,
    agent: &str,
) -> Option<&'a Pheromone> {
    let p = board.pheromones.iter_mut().find(|p| p.pheromone_id == pheromone_id)?;
    p.resolved = true;
    p.resolved_by = agent.to_string();
    p.resolved_at = Utc::now().to_rfc3339();
    Some(p)
}

/// Sense filters. Location and tag match case-insensitive substrings;
/// emitter matches case-insensitively in full.
#[derive(Debug, Clone, Default)]
pub struct SenseFilter {
    pub ptype: Option<PheromoneType>,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub emitter: Option<String>,
    pub include_resolved: bool,
}

/// Detect visible pheromones with their current intensity, strongest first.
pub fn sense_pheromones<'a>(
    board: &'a PheromoneBoard,
    filter: &SenseFilter,
    now: DateTime<Utc>,
) -> Vec<(&'a Pheromone, f64)> {
    let mut results: Vec<(&Pheromone, f64)> = Vec::new();

    for p in &board.pheromones {
        if !filter.include_resolved && p.resolved {
            continue;
        }
        let current = compute_current_intensity(p, board.half_life_hours, now);
        if current < DETECTION_THRESHOLD {
            continue;
        }
        if let Some(ptype) = filter.ptype
            && p.pheromone_type != ptype
        {
            continue;
        }
        if let Some(location) = &filter.location
            && !p.location.to_lowercase().contains(&location.to_lowercase())
        {
            continue;
        }
        if let Some(tag) = &filter.tag {
            let tag = tag.to_lowercase();
            if !p.tags.iter().any(|t| t.to_lowercase().contains(&tag)) {
                continue;
            }
        }
        if let Some(emitter) = &filter.emitter
            && !p.emitter.eq_ignore_ascii_case(emitter)
        {
            continue;
        }
        results.push((p, current));
    }

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results
}

// ============================================================================
// SHARED EMISSION (dream bridge + memory lint)
// ============================================================================

/// Emit unless an active pheromone with identical text already exists.
/// `seen_texts` carries the dedup set across a batch; callers seed it with
/// [`active_texts`]. Returns whether a pheromone was emitted.
#[allow(clippy::too_many_arguments)]
pub fn emit_unique(
    board: &mut PheromoneBoard,
    ptype: PheromoneType,
    location: &str,
    text: &str,
    emitter: &str,
    tags: Vec<String>,
    intensity: f64,
    seen_texts: &mut HashSet<String>,
) -> bool {
    if seen_texts.contains(text) {
        return false;
    }
    emit_pheromone(board, ptype, location, text, emitter, tags, intensity);
    seen_texts.insert(text.to_string());
    true
}

/// Texts of every active (non-resolved) pheromone, for cross-session dedup.
pub fn active_texts(board: &PheromoneBoard) -> HashSet<String> {
    board
        .pheromones
        .iter()
        .filter(|p| !p.resolved)
        .map(|p| p.text.clone())
        .collect()
}

// ============================================================================
// RENDERING
// ============================================================================

fn intensity_bar(intensity: f64, width: usize) -> String {
    let filled = (intensity * width as f64) as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Markdown view of sensed pheromones.
pub fn render_sense(items: &[(&Pheromone, f64)]) -> String {
    if items.is_empty() {
        return "🌿 No active pheromone detected.".to_string();
    }

    let mut lines = vec![
        "# 🐜 Active Pheromones".to_string(),
        String::new(),
        format!("> {} signal(s) detected", items.len()),
        String::new(),
    ];

    for (p, intensity) in items {
        lines.push(format!(
            "## {} {} — `{}`",
            p.pheromone_type.icon(),
            p.pheromone_type,
            p.pheromone_id
        ));
        lines.push(String::new());
        lines.push(format!("- **Zone**: {}", p.location));
        lines.push(format!("- **Signal**: {}", p.text));
        lines.push(format!("- **Emitter**: {}", p.emitter));
        lines.push(format!(
            "- **Intensity**: {} ({:.0}%)",
            intensity_bar(*intensity, 10),
            intensity * 100.0
        ));
        let reinforcers = if p.reinforced_by.is_empty() {
            String::new()
        } else {
            format!(" ({})", p.reinforced_by.join(", "))
        };
        lines.push(format!("- **Reinforced**: {}×{}", p.reinforcements, reinforcers));
        if !p.tags.is_empty() {
            lines.push(format!("- **Tags**: {}", p.tags.join(", ")));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Markdown map of the whole pheromone landscape.
pub fn render_landscape(board: &PheromoneBoard, now: DateTime<Utc>) -> String {
    let active = sense_pheromones(board, &SenseFilter::default(), now);
    let resolved = board.pheromones.iter().filter(|p| p.resolved).count();

    let mut lines = vec![
        "# 🗺️ Pheromone Landscape".to_string(),
        String::new(),
        format!("- Active signals: **{}**", active.len()),
        format!("- Resolved: **{}**", resolved),
        format!("- Total emitted: **{}**", board.total_emitted),
        format!("- Evaporated: **{}**", board.total_evaporated),
        format!("- Half-life: **{}h**", board.half_life_hours),
        String::new(),
    ];

    if !active.is_empty() {
        lines.push("## By type".to_string());
        lines.push(String::new());
        lines.push("| Type | Count | Avg intensity |".to_string());
        lines.push("|------|-------|---------------|".to_string());
        for ptype in PheromoneType::ALL {
            let items: Vec<&(&Pheromone, f64)> =
                active.iter().filter(|(p, _)| p.pheromone_type == ptype).collect();
            if !items.is_empty() {
                let avg: f64 = items.iter().map(|(_, i)| i).sum::<f64>() / items.len() as f64;
                lines.push(format!(
                    "| {} {} | {} | {:.0}% |",
                    ptype.icon(),
                    ptype,
                    items.len(),
                    avg * 100.0
                ));
            }
        }
        lines.push(String::new());

        // Active zones (top 10 by signal count)
        let mut by_location: Vec<(String, Vec<(&Pheromone, f64)>)> = Vec::new();
        for &(p, i) in &active {
            match by_location.iter_mut().find(|(loc, _)| loc == &p.location) {
                Some((_, items)) => items.push((p, i)),
                None => by_location.push((p.location.clone(), vec![(p, i)])),
            }
        }
        by_location.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        lines.push("## Active zones (top 10)".to_string());
        lines.push(String::new());
        lines.push("| Zone | Signals | Agents | Max intensity |".to_string());
        lines.push("|------|---------|--------|---------------|".to_string());
        for (loc, items) in by_location.iter().take(10) {
            let mut agents: Vec<&str> = items.iter().map(|(p, _)| p.emitter.as_str()).collect();
            agents.sort_unstable();
            agents.dedup();
            let max_i = items.iter().map(|(_, i)| *i).fold(0.0_f64, f64::max);
            lines.push(format!(
                "| {} | {} | {} | {:.0}% |",
                loc,
                items.len(),
                agents.join(", "),
                max_i * 100.0
            ));
        }
        lines.push(String::new());

        // Emitter counts
        let mut by_emitter: Vec<(String, usize)> = Vec::new();
        for (p, _) in &active {
            match by_emitter.iter_mut().find(|(e, _)| e == &p.emitter) {
                Some((_, count)) => *count += 1,
                None => by_emitter.push((p.emitter.clone(), 1)),
            }
        }
        by_emitter.sort_by(|a, b| b.1.cmp(&a.1));

        lines.push("## Active agents".to_string());
        lines.push(String::new());
        for (agent, count) in by_emitter {
            lines.push(format!("- **{}**: {} signal(s)", agent, count));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Evaporation result summary.
pub fn render_evaporate(evaporated: usize, remaining: usize, dry_run: bool) -> String {
    let prefix = if dry_run { "🔍 DRY RUN — " } else { "" };
    format!(
        "{}🌬️ Evaporation complete\n\n- Pheromones evaporated: **{}**\n- Pheromones remaining: **{}**\n",
        prefix, evaporated, remaining
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn emit_at(board: &mut PheromoneBoard, ptype: PheromoneType, location: &str, text: &str, emitter: &str, intensity: f64, ts: DateTime<Utc>) -> Pheromone {
        emit_pheromone_at(board, ptype, location, text, emitter, vec![], intensity, &ts.to_rfc3339())
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = generate_id(PheromoneType::Need, "src/auth", "review", "2026-01-01T00:00:00+00:00");
        let b = generate_id(PheromoneType::Need, "src/auth", "review", "2026-01-01T00:00:00+00:00");
        let c = generate_id(PheromoneType::Alert, "src/auth", "review", "2026-01-01T00:00:00+00:00");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("PH-"));
        assert_eq!(a.len(), 11);
    }

    #[test]
    fn test_intensity_clamped_and_rounded() {
        let mut board = PheromoneBoard::default();
        let p = emit_pheromone(&mut board, PheromoneType::Need, "x", "y", "dev", vec![], 7.3);
        assert_eq!(p.intensity, 1.0);
        let p = emit_pheromone(&mut board, PheromoneType::Need, "x", "z", "dev", vec![], -0.5);
        assert_eq!(p.intensity, 0.0);
        assert_eq!(board.total_emitted, 2);
    }

    #[test]
    fn test_decay_halves_at_half_life() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        let p = emit_at(&mut board, PheromoneType::Need, "src/auth", "review", "dev", 1.0, t0);

        let at_emit = compute_current_intensity(&p, 72.0, t0);
        assert!((at_emit - 1.0).abs() < 1e-6);

        let after_half_life = compute_current_intensity(&p, 72.0, t0 + Duration::hours(72));
        assert!((after_half_life - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_future_and_invalid_timestamps_return_base() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        let p = emit_at(&mut board, PheromoneType::Need, "x", "y", "dev", 0.8, t0 + Duration::hours(5));
        assert_eq!(compute_current_intensity(&p, 72.0, t0), 0.8);

        let mut broken = p.clone();
        broken.timestamp = "not-a-date".to_string();
        assert_eq!(compute_current_intensity(&broken, 72.0, t0), 0.8);
    }

    #[test]
    fn test_decay_monotonically_non_increasing() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        let p = emit_at(&mut board, PheromoneType::Progress, "x", "y", "dev", 0.9, t0);
        let mut last = p.intensity;
        for h in 1..20 {
            let current = compute_current_intensity(&p, 72.0, t0 + Duration::hours(h * 24));
            assert!(current <= last + 1e-12);
            assert!(current >= 0.0 && current <= p.intensity);
            last = current;
        }
    }

    #[test]
    fn test_amplify_boosts_and_dedups_agents() {
        let mut board = PheromoneBoard::default();
        let p = emit_pheromone(&mut board, PheromoneType::Need, "src/auth", "review", "dev", vec![], 0.5);
        let id = p.pheromone_id.clone();

        let p = amplify_pheromone(&mut board, &id, "qa").unwrap();
        assert!((p.intensity - 0.7).abs() < 1e-9);
        assert_eq!(p.reinforcements, 1);
        assert_eq!(p.reinforced_by, vec!["qa"]);

        let p = amplify_pheromone(&mut board, &id, "qa").unwrap();
        assert!((p.intensity - 0.9).abs() < 1e-9);
        assert_eq!(p.reinforcements, 2);
        assert_eq!(p.reinforced_by, vec!["qa"]);

        // Capped at 1.0
        let p = amplify_pheromone(&mut board, &id, "architect").unwrap();
        assert_eq!(p.intensity, 1.0);
        assert_eq!(p.reinforced_by, vec!["qa", "architect"]);

        assert!(amplify_pheromone(&mut board, "PH-missing", "qa").is_none());
    }

    #[test]
    fn test_resolved_excluded_from_default_sense() {
        let mut board = PheromoneBoard::default();
        let p = emit_pheromone(&mut board, PheromoneType::Block, "src/db", "stuck", "dev", vec![], 0.8);
        let id = p.pheromone_id.clone();
        resolve_pheromone(&mut board, &id, "qa").unwrap();

        let now = Utc::now();
        assert!(sense_pheromones(&board, &SenseFilter::default(), now).is_empty());

        let filter = SenseFilter { include_resolved: true, ..Default::default() };
        assert_eq!(sense_pheromones(&board, &filter, now).len(), 1);
        // Still on the board
        assert_eq!(board.pheromones.len(), 1);
        assert_eq!(board.pheromones[0].resolved_by, "qa");
    }

    #[test]
    fn test_sense_filters_and_ordering() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        emit_at(&mut board, PheromoneType::Need, "src/auth", "weak", "dev", 0.3, t0);
        emit_at(&mut board, PheromoneType::Alert, "src/db", "strong", "qa", 0.9, t0);
        emit_at(&mut board, PheromoneType::Need, "src/API", "mid", "dev", 0.6, t0);
        board.pheromones.last_mut().unwrap().tags = vec!["Security".to_string()];

        let all = sense_pheromones(&board, &SenseFilter::default(), t0);
        assert_eq!(all.len(), 3);
        // Strongest first
        assert_eq!(all[0].0.text, "strong");

        let filter = SenseFilter { ptype: Some(PheromoneType::Alert), ..Default::default() };
        assert_eq!(sense_pheromones(&board, &filter, t0).len(), 1);

        // Case-insensitive substring on location
        let filter = SenseFilter { location: Some("api".to_string()), ..Default::default() };
        assert_eq!(sense_pheromones(&board, &filter, t0).len(), 1);

        let filter = SenseFilter { tag: Some("security".to_string()), ..Default::default() };
        assert_eq!(sense_pheromones(&board, &filter, t0).len(), 1);

        let filter = SenseFilter { emitter: Some("QA".to_string()), ..Default::default() };
        assert_eq!(sense_pheromones(&board, &filter, t0).len(), 1);
    }

    #[test]
    fn test_threshold_boundary() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        emit_at(&mut board, PheromoneType::Need, "x", "at-threshold", "dev", DETECTION_THRESHOLD, t0);
        emit_at(&mut board, PheromoneType::Need, "x", "below", "dev", 0.0, t0);

        let sensed = sense_pheromones(&board, &SenseFilter::default(), t0);
        assert_eq!(sensed.len(), 1);
        assert_eq!(sensed[0].0.text, "at-threshold");
    }

    #[test]
    fn test_evaporate_drops_faded_and_resolved() {
        let t0 = Utc::now();
        let mut board = PheromoneBoard::default();
        emit_at(&mut board, PheromoneType::Need, "x", "fresh", "dev", 0.9, t0);
        emit_at(&mut board, PheromoneType::Need, "x", "old", "dev", 0.7, t0 - Duration::hours(720));
        let p = emit_at(&mut board, PheromoneType::Need, "x", "done", "dev", 0.9, t0);
        let id = p.pheromone_id.clone();
        resolve_pheromone(&mut board, &id, "dev");

        let evaporated = evaporate(&mut board, t0);
        assert_eq!(evaporated, 2);
        assert_eq!(board.total_evaporated, 2);
        assert_eq!(board.pheromones.len(), 1);
        assert_eq!(board.pheromones[0].text, "fresh");

        // Idempotent at the same reference time
        let again = evaporate(&mut board, t0);
        assert_eq!(again, 0);
        assert_eq!(board.total_evaporated, 2);
    }

    #[test]
    fn test_lifecycle_scenario() {
        // Emit at T0 with base 1.0, amplify at T0+72h, evaporate at T0+720h.
        let t0 = Utc::now() - Duration::hours(720);
        let mut board = PheromoneBoard::default();
        let p = emit_at(&mut board, PheromoneType::Need, "src/auth", "security review required", "dev", 1.0, t0);
        let id = p.pheromone_id.clone();

        let current = compute_current_intensity(&p, DEFAULT_HALF_LIFE_HOURS, t0 + Duration::hours(72));
        assert!((current - 0.5).abs() < 1e-6);

        // Re-base at 0.5 so the boost is observable below the cap
        board.pheromones[0].intensity = 0.5;
        let p = amplify_pheromone(&mut board, &id, "qa").unwrap();
        assert!((p.intensity - 0.7).abs() < 1e-9);
        assert_eq!(p.reinforcements, 1);
        assert_eq!(p.reinforced_by, vec!["qa"]);

        // At T0 + 10 half-lives the signal is far below threshold.
        let now = t0 + Duration::hours(720);
        let current = compute_current_intensity(&board.pheromones[0], DEFAULT_HALF_LIFE_HOURS, now);
        assert!(current < DETECTION_THRESHOLD);

        let evaporated = evaporate(&mut board, now);
        assert_eq!(evaporated, 1);
        assert_eq!(board.total_evaporated, 1);
        assert!(board.pheromones.is_empty());
    }

    #[test]
    fn test_board_save_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let mut board = PheromoneBoard::default();
        let p = emit_pheromone(
            &mut board,
            PheromoneType::Opportunity,
            "src/cache",
            "memoize lookups",
            "architect",
            vec!["perf".to_string()],
            0.8,
        );
        amplify_pheromone(&mut board, &p.pheromone_id.clone(), "dev");

        save_board(&paths, &board).unwrap();
        let loaded = load_board(&paths);
        assert_eq!(loaded, board);
    }

    #[test]
    fn test_load_missing_or_corrupt_board_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        assert_eq!(load_board(&paths), PheromoneBoard::default());

        std::fs::create_dir_all(paths.output_dir()).unwrap();
        std::fs::write(paths.pheromone_board(), "{{{").unwrap();
        assert_eq!(load_board(&paths), PheromoneBoard::default());
    }

    #[test]
    fn test_emit_unique_dedups_against_active_texts() {
        let mut board = PheromoneBoard::default();
        emit_pheromone(&mut board, PheromoneType::Alert, "x", "same text", "lint", vec![], 0.8);
        let mut seen = active_texts(&board);

        assert!(!emit_unique(&mut board, PheromoneType::Alert, "x", "same text", "lint", vec![], 0.8, &mut seen));
        assert!(emit_unique(&mut board, PheromoneType::Alert, "x", "other text", "lint", vec![], 0.8, &mut seen));
        assert!(!emit_unique(&mut board, PheromoneType::Alert, "y", "other text", "lint", vec![], 0.8, &mut seen));
        assert_eq!(board.pheromones.len(), 2);
    }

    #[test]
    fn test_unknown_type_parses_as_need() {
        assert_eq!(PheromoneType::parse_name("WEIRD"), PheromoneType::Need);
        assert_eq!(PheromoneType::parse_name("block"), PheromoneType::Block);
    }

    #[test]
    fn test_board_json_field_names() {
        let mut board = PheromoneBoard::default();
        emit_pheromone(&mut board, PheromoneType::Need, "src/auth", "review", "dev", vec![], 0.7);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["half_life_hours"], 72.0);
        let p = &json["pheromones"][0];
        assert_eq!(p["pheromone_type"], "NEED");
        assert!(p["pheromone_id"].as_str().unwrap().starts_with("PH-"));
        assert!(p["resolved_at"].as_str().unwrap().is_empty());
    }
}
