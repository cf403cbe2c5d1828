//! Trail analysis
//!
//! Detects emergent coordination patterns on the board. Patterns are
//! computed over *current* intensities (post-evaporation view) and
//! deduplicated by (kind, location).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    DETECTION_THRESHOLD, Pheromone, PheromoneBoard, PheromoneType, SenseFilter,
    compute_current_intensity, sense_pheromones,
};

/// The five emergent patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailKind {
    /// >= 3 active signals at the same location.
    HotZone,
    /// Location with resolved history and no active signal.
    ColdZone,
    /// >= 2 distinct emitters at the same location.
    Convergence,
    /// >= 2 BLOCK signals at the same location.
    Bottleneck,
    /// COMPLETE handed off to a NEED/PROGRESS by a different emitter.
    Relay,
}

impl TrailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrailKind::HotZone => "hot-zone",
            TrailKind::ColdZone => "cold-zone",
            TrailKind::Convergence => "convergence",
            TrailKind::Bottleneck => "bottleneck",
            TrailKind::Relay => "relay",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TrailKind::HotZone => "🔥",
            TrailKind::ColdZone => "❄️",
            TrailKind::Convergence => "🎯",
            TrailKind::Bottleneck => "🚧",
            TrailKind::Relay => "🔄",
        }
    }
}

impl std::fmt::Display for TrailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected coordination pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailPattern {
    pub pattern_type: TrailKind,
    pub location: String,
    pub description: String,
    pub involved_agents: Vec<String>,
    pub pheromone_count: usize,
    pub avg_intensity: f64,
}

/// Detect emergent coordination patterns.
pub fn analyze_trails(board: &PheromoneBoard, now: DateTime<Utc>) -> Vec<TrailPattern> {
    let mut patterns: Vec<TrailPattern> = Vec::new();

    // Active signals grouped by location, insertion order preserved.
    let mut by_location: Vec<(String, Vec<(&Pheromone, f64)>)> = Vec::new();
    for p in &board.pheromones {
        if p.resolved {
            continue;
        }
        let current = compute_current_intensity(p, board.half_life_hours, now);
        if current < DETECTION_THRESHOLD {
            continue;
        }
        match by_location.iter_mut().find(|(loc, _)| loc == &p.location) {
            Some((_, items)) => items.push((p, current)),
            None => by_location.push((p.location.clone(), vec![(p, current)])),
        }
    }

    for (loc, items) in &by_location {
        let mut agents: Vec<String> = items.iter().map(|(p, _)| p.emitter.clone()).collect();
        agents.sort_unstable();
        agents.dedup();
        let avg_intensity = items.iter().map(|(_, i)| i).sum::<f64>() / items.len() as f64;

        if items.len() >= 3 {
            patterns.push(TrailPattern {
                pattern_type: TrailKind::HotZone,
                location: loc.clone(),
                description: format!("{} active signals — intense activity zone", items.len()),
                involved_agents: agents.clone(),
                pheromone_count: items.len(),
                avg_intensity,
            });
        }

        if agents.len() >= 2 {
            patterns.push(TrailPattern {
                pattern_type: TrailKind::Convergence,
                location: loc.clone(),
                description: format!("{} agents converging on this zone", agents.len()),
                involved_agents: agents.clone(),
                pheromone_count: items.len(),
                avg_intensity,
            });
        }

        let blocks: Vec<&Pheromone> = items
            .iter()
            .filter(|(p, _)| p.pheromone_type == PheromoneType::Block)
            .map(|(p, _)| *p)
            .collect();
        if blocks.len() >= 2 {
            patterns.push(TrailPattern {
                pattern_type: TrailKind::Bottleneck,
                location: loc.clone(),
                description: format!("{} blocks in this zone — potential bottleneck", blocks.len()),
                involved_agents: blocks.iter().map(|b| b.emitter.clone()).collect(),
                pheromone_count: blocks.len(),
                avg_intensity,
            });
        }
    }

    // Cold zones: resolved history, no active signal.
    let mut cold_locations: Vec<String> = board
        .pheromones
        .iter()
        .filter(|p| p.resolved)
        .map(|p| p.location.clone())
        .filter(|loc| !by_location.iter().any(|(active, _)| active == loc))
        .collect();
    cold_locations.sort_unstable();
    cold_locations.dedup();
    for loc in cold_locations {
        patterns.push(TrailPattern {
            pattern_type: TrailKind::ColdZone,
            location: loc,
            description: "Previously active zone, now silent".to_string(),
            involved_agents: Vec::new(),
            pheromone_count: 0,
            avg_intensity: 0.0,
        });
    }

    // Relay: a COMPLETE (possibly resolved) with an active NEED/PROGRESS by
    // a different emitter at the same location.
    let completes = sense_pheromones(
        board,
        &SenseFilter {
            ptype: Some(PheromoneType::Complete),
            include_resolved: true,
            ..Default::default()
        },
        now,
    );
    for (complete, _) in completes {
        for p in &board.pheromones {
            if p.pheromone_id == complete.pheromone_id
                || p.location != complete.location
                || p.emitter == complete.emitter
                || p.resolved
            {
                continue;
            }
            if !matches!(p.pheromone_type, PheromoneType::Need | PheromoneType::Progress) {
                continue;
            }
            let current = compute_current_intensity(p, board.half_life_hours, now);
            if current >= DETECTION_THRESHOLD {
                patterns.push(TrailPattern {
                    pattern_type: TrailKind::Relay,
                    location: complete.location.clone(),
                    description: format!(
                        "Relay: {} → {} (complete → {})",
                        complete.emitter,
                        p.emitter,
                        p.pheromone_type.as_str().to_lowercase()
                    ),
                    involved_agents: vec![complete.emitter.clone(), p.emitter.clone()],
                    pheromone_count: 2,
                    avg_intensity: current,
                });
            }
        }
    }

    // Deduplicate by (kind, location), keeping the first occurrence.
    let mut seen: std::collections::HashSet<(TrailKind, String)> = std::collections::HashSet::new();
    patterns.retain(|p| seen.insert((p.pattern_type, p.location.clone())));

    patterns
}

/// Markdown view of detected patterns, busiest first.
pub fn render_trails(patterns: &[TrailPattern]) -> String {
    if patterns.is_empty() {
        return "🌿 No emergent coordination pattern detected.".to_string();
    }

    let mut sorted: Vec<&TrailPattern> = patterns.iter().collect();
    sorted.sort_by(|a, b| b.pheromone_count.cmp(&a.pheromone_count));

    let mut lines = vec![
        "# 🐜 Trails — Coordination patterns".to_string(),
        String::new(),
        format!("> {} pattern(s) detected", patterns.len()),
        String::new(),
    ];

    for pattern in sorted {
        lines.push(format!(
            "## {} {} — {}",
            pattern.pattern_type.icon(),
            pattern.pattern_type.as_str().to_uppercase(),
            pattern.location
        ));
        lines.push(String::new());
        lines.push(pattern.description.clone());
        lines.push(String::new());
        if !pattern.involved_agents.is_empty() {
            lines.push(format!("- **Agents**: {}", pattern.involved_agents.join(", ")));
        }
        lines.push(format!(
            "- **Signals**: {} | Avg intensity: {:.0}%",
            pattern.pheromone_count,
            pattern.avg_intensity * 100.0
        ));
        lines.push(String::new());
    }

    lines.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================
