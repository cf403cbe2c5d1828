//! Orchestrator
//!
//! Runs the whole nervous system in one invocation, in a fixed order:
//!
//! 1. Dream (off-session consolidation)
//! 2. Stigmergy evaporation (dead-signal cleanup)
//! 3. Anti-fragility score
//! 4. Agent darwinism
//! 5. Memory lint
//!
//! The order is load-bearing: later phases read board and history files
//! earlier phases may have written. A phase error is captured into its
//! result and never aborts the run.

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use crate::dream::{DreamRunOptions, run_dream_cycle};
use crate::memory::ProjectPaths;
use crate::stigmergy::{self, SenseFilter};
use crate::{antifragile, darwinism, dream, lint};

pub const ORCHESTRATOR_VERSION: &str = "1.0.0";

// ============================================================================
// TYPES
// ============================================================================

/// Phase completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Ok,
    Skip,
    Error,
}

impl PhaseStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            PhaseStatus::Ok => "✅",
            PhaseStatus::Skip => "⏭️",
            PhaseStatus::Error => "❌",
        }
    }
}

/// Result of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub name: &'static str,
    pub status: PhaseStatus,
    pub duration_ms: u64,
    pub summary: String,
    pub data: Value,
    pub error: String,
}

impl PhaseResult {
    fn ok(name: &'static str, started: Instant, summary: String, data: Value) -> Self {
        Self {
            name,
            status: PhaseStatus::Ok,
            duration_ms: started.elapsed().as_millis() as u64,
            summary,
            data,
            error: String::new(),
        }
    }

    fn error(name: &'static str, started: Instant, error: String) -> Self {
        Self {
            name,
            status: PhaseStatus::Error,
            duration_ms: started.elapsed().as_millis() as u64,
            summary: String::new(),
            data: Value::Null,
            error,
        }
    }
}

/// Unified report: the machine contract for external tooling.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorReport {
    pub version: &'static str,
    pub timestamp: String,
    pub total_duration_ms: u64,
    pub phases: Vec<PhaseResult>,
}

impl OrchestratorReport {
    pub fn ok_count(&self) -> usize {
        self.phases.iter().filter(|p| p.status == PhaseStatus::Ok).count()
    }

    pub fn error_count(&self) -> usize {
        self.phases.iter().filter(|p| p.status == PhaseStatus::Error).count()
    }
}

/// Run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// `YYYY-MM-DD` or `auto` (resolved once, against the dream stamp).
    pub since: Option<String>,
    pub quick: bool,
    /// Let dream and lint publish pheromones.
    pub emit: bool,
}

// ============================================================================
// PHASES
// ============================================================================

fn run_dream_phase(paths: &ProjectPaths, since: Option<&str>, quick: bool, emit: bool) -> PhaseResult {
    let started = Instant::now();
    let options = DreamRunOptions {
        since: since.map(str::to_string),
        agent: None,
        validate: true,
        quick,
        dry_run: false,
        emit,
    };
    match run_dream_cycle(paths, &options) {
        Ok(outcome) => {
            if outcome.sources.is_empty() {
                return PhaseResult::ok(
                    "dream",
                    started,
                    "No memory source".to_string(),
                    json!({ "insights": 0, "sources": 0 }),
                );
            }
            let (new, persistent, resolved) = outcome
                .diff
                .as_ref()
                .map(|d| (d.new.len(), d.persistent.len(), d.resolved.len()))
                .unwrap_or((0, 0, 0));
            let diff_summary = if outcome.diff.is_some() {
                format!(" (new: {}, persistent: {}, resolved: {})", new, persistent, resolved)
            } else {
                String::new()
            };
            PhaseResult::ok(
                "dream",
                started,
                format!("{} insights{}", outcome.insights.len(), diff_summary),
                json!({
                    "insights": outcome.insights.len(),
                    "sources": outcome.sources.len(),
                    "emitted": outcome.emitted,
                    "diff": { "new": new, "persistent": persistent, "resolved": resolved },
                }),
            )
        }
        Err(e) => PhaseResult::error("dream", started, e.to_string()),
    }
}

fn run_stigmergy_phase(paths: &ProjectPaths) -> PhaseResult {
    let started = Instant::now();
    let now = Utc::now();
    let mut board = stigmergy::load_board(paths);
    let evaporated = stigmergy::evaporate(&mut board, now);
    if evaporated > 0
        && let Err(e) = stigmergy::save_board(paths, &board)
    {
        return PhaseResult::error("stigmergy", started, e.to_string());
    }

    let active = stigmergy::sense_pheromones(&board, &SenseFilter::default(), now);
    let mut by_type: Vec<(String, usize)> = Vec::new();
    for (p, _) in &active {
        match by_type.iter_mut().find(|(t, _)| t == p.pheromone_type.as_str()) {
            Some((_, count)) => *count += 1,
            None => by_type.push((p.pheromone_type.as_str().to_string(), 1)),
        }
    }

    let by_type: serde_json::Map<String, Value> =
        by_type.into_iter().map(|(t, count)| (t, json!(count))).collect();

    PhaseResult::ok(
        "stigmergy",
        started,
        format!("{} active, {} evaporated", active.len(), evaporated),
        json!({
            "active": active.len(),
            "evaporated": evaporated,
            "total_emitted": board.total_emitted,
            "by_type": by_type,
        }),
    )
}

fn run_antifragile_phase(paths: &ProjectPaths, since: Option<&str>) -> PhaseResult {
    let started = Instant::now();
    let result = antifragile::compute_antifragile_score(paths, since);
    if let Err(e) = antifragile::save_score(&result, paths) {
        return PhaseResult::error("antifragile", started, e.to_string());
    }

    let dimensions: serde_json::Map<String, Value> = result
        .dimensions
        .iter()
        .map(|d| (d.name.to_string(), json!((d.score * 1000.0).round() / 10.0)))
        .collect();

    PhaseResult::ok(
        "antifragile",
        started,
        format!("Score: {:.0}/100 — {}", result.global_score, result.level),
        json!({
            "score": result.global_score,
            "level": result.level,
            "dimensions": dimensions,
        }),
    )
}

fn run_darwinism_phase(paths: &ProjectPaths, since: Option<&str>) -> PhaseResult {
    let started = Instant::now();
    match darwinism::evaluate_generation(paths, since, false) {
        Ok((scores, _actions)) => {
            if scores.is_empty() {
                return PhaseResult::ok(
                    "darwinism",
                    started,
                    "No agent evaluated".to_string(),
                    json!({ "agents": {} }),
                );
            }
            let agents: serde_json::Map<String, Value> = scores
                .iter()
                .map(|s| {
                    (
                        s.agent_id.clone(),
                        json!({ "fitness": s.composite, "level": s.level }),
                    )
                })
                .collect();
            let top = scores
                .iter()
                .max_by(|a, b| a.composite.partial_cmp(&b.composite).unwrap_or(std::cmp::Ordering::Equal))
                .expect("non-empty scores");
            PhaseResult::ok(
                "darwinism",
                started,
                format!("{} agents — top: {} ({:.0})", scores.len(), top.agent_id, top.composite),
                json!({ "agents": agents }),
            )
        }
        Err(e) => PhaseResult::error("darwinism", started, e.to_string()),
    }
}

fn run_memory_lint_phase(paths: &ProjectPaths, emit: bool) -> PhaseResult {
    let started = Instant::now();
    let report = lint::lint_memory(paths);

    let mut emitted = 0;
    if emit && report.error_count() > 0 {
        match lint::emit_to_stigmergy(&report, paths) {
            Ok(count) => emitted = count,
            Err(e) => return PhaseResult::error("memory-lint", started, e.to_string()),
        }
    }

    PhaseResult::ok(
        "memory-lint",
        started,
        format!(
            "{}E {}W {}I ({} entries)",
            report.error_count(),
            report.warning_count(),
            report.info_count(),
            report.entries_scanned
        ),
        json!({
            "errors": report.error_count(),
            "warnings": report.warning_count(),
            "info": report.info_count(),
            "files_scanned": report.files_scanned,
            "entries_scanned": report.entries_scanned,
            "emitted": emitted,
        }),
    )
}

// ============================================================================
// RUN
// ============================================================================

/// Execute all five phases and build the unified report.
pub fn run(paths: &ProjectPaths, options: &RunOptions) -> OrchestratorReport {
    let total_started = Instant::now();

    // Resolve `auto` once so every phase filters on the same date.
    let since = match options.since.as_deref() {
        Some("auto") => dream::journal::read_last_dream_timestamp(paths),
        Some(date) => Some(date.to_string()),
        None => None,
    };
    let since = since.as_deref();

    let phases = vec![
        run_dream_phase(paths, since, options.quick, options.emit),
        run_stigmergy_phase(paths),
        run_antifragile_phase(paths, since),
        run_darwinism_phase(paths, since),
        run_memory_lint_phase(paths, options.emit),
    ];

    OrchestratorReport {
        version: ORCHESTRATOR_VERSION,
        timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        total_duration_ms: total_started.elapsed().as_millis() as u64,
        phases,
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Boxed human report.
pub fn render_report(report: &OrchestratorReport) -> String {
    let mut lines = vec![
        String::new(),
        "╔══════════════════════════════════════════════════════════════╗".to_string(),
        "║        🧠 Nervous System Orchestrator — Report               ║".to_string(),
        "╚══════════════════════════════════════════════════════════════╝".to_string(),
        String::new(),
        format!("  Timestamp: {}", report.timestamp),
        format!("  Total duration: {}ms", report.total_duration_ms),
        format!("  Phases: {} OK, {} errors", report.ok_count(), report.error_count()),
        String::new(),
        "┌──────────────┬────────┬──────────┬─────────────────────────────────┐".to_string(),
        "│ Phase        │ Status │ Duration │ Summary                         │".to_string(),
        "├──────────────┼────────┼──────────┼─────────────────────────────────┤".to_string(),
    ];

    for phase in &report.phases {
        let summary = if phase.summary.is_empty() { &phase.error } else { &phase.summary };
        let summary: String = summary.chars().take(31).collect();
        lines.push(format!(
            "│ {:<12} │ {}     │ {:>6}ms │ {:<31} │",
            phase.name,
            phase.status.icon(),
            phase.duration_ms,
            summary
        ));
    }
    lines.push("└──────────────┴────────┴──────────┴─────────────────────────────────┘".to_string());
    lines.push(String::new());

    let errors: Vec<&PhaseResult> = report.phases.iter().filter(|p| p.status == PhaseStatus::Error).collect();
    if !errors.is_empty() {
        lines.push("⚠️  Error details:".to_string());
        for phase in errors {
            lines.push(format!("  ❌ {}: {}", phase.name, phase.error));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Machine-readable report keyed by phase name.
pub fn report_to_json(report: &OrchestratorReport) -> Value {
    let phases: serde_json::Map<String, Value> = report
        .phases
        .iter()
        .map(|p| {
            (
                p.name.to_string(),
                json!({
                    "status": p.status,
                    "duration_ms": p.duration_ms,
                    "summary": p.summary,
                    "data": p.data,
                    "error": p.error,
                }),
            )
        })
        .collect();

    json!({
        "version": report.version,
        "timestamp": report.timestamp,
        "total_duration_ms": report.total_duration_ms,
        "summary": {
            "ok": report.ok_count(),
            "errors": report.error_count(),
            "phases": report.phases.len(),
        },
        "phases": phases,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stigmergy::{PheromoneType, emit_pheromone_at};
    use chrono::Duration;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.learnings_dir()).unwrap();
        std::fs::create_dir_all(paths.output_dir()).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_empty_project_runs_all_phases_ok() {
        let (_dir, paths) = project();
        let report = run(&paths, &RunOptions::default());

        assert_eq!(report.phases.len(), 5);
        assert_eq!(report.error_count(), 0);
        let names: Vec<&str> = report.phases.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["dream", "stigmergy", "antifragile", "darwinism", "memory-lint"]);
        assert_eq!(report.phases[0].summary, "No memory source");
        assert_eq!(report.phases[3].summary, "No agent evaluated");
    }

    #[test]
    fn test_phases_persist_their_outputs() {
        let (_dir, paths) = project();
        std::fs::write(
            paths.learnings_dir().join("dev.md"),
            "- [2026-01-05] TODO automatiser le déploiement complet\n",
        )
        .unwrap();
        std::fs::write(
            paths.trace(),
            "## 2026-01-05 | dev | story-1\n[DECISION] ship the pipeline\n\n",
        )
        .unwrap();

        let report = run(&paths, &RunOptions::default());
        assert_eq!(report.error_count(), 0);

        // Dream wrote its journal + memory + stamp
        assert!(paths.dream_journal().exists());
        assert!(paths.dream_memory().exists());
        assert!(paths.dream_last_run().exists());
        // Scorer and darwinism appended their histories
        assert_eq!(antifragile::load_history(&paths).len(), 1);
        assert_eq!(darwinism::load_history(&paths).len(), 1);

        // Two runs → two history entries each
        run(&paths, &RunOptions::default());
        assert_eq!(antifragile::load_history(&paths).len(), 2);
        assert_eq!(darwinism::load_history(&paths).len(), 2);
    }

    #[test]
    fn test_evaporation_phase_saves_only_when_needed() {
        let (_dir, paths) = project();
        let mut board = stigmergy::PheromoneBoard::default();
        let old = (Utc::now() - Duration::hours(720)).to_rfc3339();
        emit_pheromone_at(&mut board, PheromoneType::Need, "x", "faded", "dev", vec![], 0.5, &old);
        stigmergy::save_board(&paths, &board).unwrap();

        let report = run(&paths, &RunOptions::default());
        let stigmergy_phase = report.phases.iter().find(|p| p.name == "stigmergy").unwrap();
        assert_eq!(stigmergy_phase.data["evaporated"], 1);

        let board = stigmergy::load_board(&paths);
        assert!(board.pheromones.is_empty());
        assert_eq!(board.total_evaporated, 1);
    }

    #[test]
    fn test_emit_flag_routes_lint_errors_to_board() {
        let (_dir, paths) = project();
        std::fs::write(
            paths.learnings_dir().join("dev.md"),
            "- On doit toujours activer le cache agressif pour les données\n",
        )
        .unwrap();
        std::fs::write(
            paths.failure_museum(),
            "- Le cache agressif a causé des données périmées, éviter\n",
        )
        .unwrap();

        let report = run(&paths, &RunOptions { emit: true, ..Default::default() });
        let lint_phase = report.phases.iter().find(|p| p.name == "memory-lint").unwrap();
        assert!(lint_phase.data["errors"].as_u64().unwrap() >= 1);
        assert!(lint_phase.data["emitted"].as_u64().unwrap() >= 1);

        let board = stigmergy::load_board(&paths);
        assert!(board.pheromones.iter().any(|p| p.emitter == "memory-lint"));
    }

    #[test]
    fn test_json_report_contract() {
        let (_dir, paths) = project();
        let report = run(&paths, &RunOptions::default());
        let value = report_to_json(&report);

        assert_eq!(value["version"], ORCHESTRATOR_VERSION);
        assert_eq!(value["summary"]["phases"], 5);
        assert_eq!(value["phases"]["dream"]["status"], "ok");
        assert!(value["phases"]["antifragile"]["data"]["score"].is_number());
    }
}
