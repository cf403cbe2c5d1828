//! Journey: the orchestrated cycle over a lived-in project — scoring,
//! fitness generations, lint emission, phase ordering.

use ganglion_core::orchestrator::{self, PhaseStatus, RunOptions};
use ganglion_core::{antifragile, darwinism, lint, stigmergy};
use ganglion_e2e_tests::TestProject;

fn lived_in_project() -> TestProject {
    let project = TestProject::new();

    project.write_learnings(
        "dev",
        &[
            "[2026-01-05] prepared statements cut query time in half",
            "[2026-01-06] TODO automatiser la rotation des logs",
            "[2026-01-07] on doit toujours chiffrer les exports de données clients",
        ],
    );
    project.write_learnings("qa", &["[2026-01-06] flaky tests get quarantined first"]);
    project.write_decisions(&[
        "[2026-01-05] adopt the event ledger for billing",
        "[2026-01-08] revert the cache layer rollout, rollback complet",
    ]);
    project.write_failure_museum(
        "### [2026-01-10] CC-FAIL — merged without running checks\n\
         - Leçon : the gate exists for a reason\n\
         - Règle instaurée : CI must be green before merge\n",
    );
    project.write_trace(
        "## 2026-01-05 10:00 | dev | story-1\n[GIT-COMMIT] abc123 ledger skeleton\n\n\
         ## 2026-01-05 11:00 | dev | story-1\n[DECISION] adopt the event ledger for billing\n\n\
         ## 2026-01-06 09:00 | dev | story-2\n[AC-PASS] ledger criteria green\n\n\
         ## 2026-01-06 10:00 | qa | story-2\n[CHECKPOINT] checkpoint_id=11\n\n",
    );
    project.write_shared_context("## Goals\nShip billing on the ledger\n\n## Stack\nRust services\n");
    project
}

#[test]
fn full_run_executes_phases_in_order_and_persists() {
    let project = lived_in_project();

    let report = orchestrator::run(&project.paths, &RunOptions::default());

    let names: Vec<&str> = report.phases.iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["dream", "stigmergy", "antifragile", "darwinism", "memory-lint"]);
    assert_eq!(report.error_count(), 0);
    assert!(report.phases.iter().all(|p| p.status == PhaseStatus::Ok));

    // Phase outputs landed on disk
    assert!(project.paths.dream_journal().exists());
    assert_eq!(antifragile::load_history(&project.paths).len(), 1);
    let generations = darwinism::load_history(&project.paths);
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].generation, 1);
    assert!(generations[0].scores.iter().any(|s| s.agent_id == "dev"));

    // A second run grows both histories and bumps the generation
    let report = orchestrator::run(&project.paths, &RunOptions::default());
    assert_eq!(report.error_count(), 0);
    assert_eq!(antifragile::load_history(&project.paths).len(), 2);
    let generations = darwinism::load_history(&project.paths);
    assert_eq!(generations.last().unwrap().generation, 2);
}

#[test]
fn antifragile_score_reflects_memory_state() {
    let project = lived_in_project();

    let result = antifragile::compute_antifragile_score(&project.paths, None);
    assert!(result.total_evidence > 0);
    assert!(result.global_score > 0.0 && result.global_score <= 100.0);
    assert_eq!(result.dimensions.len(), 6);

    // The lone failure carries both a lesson and a rule: recovery is perfect.
    let recovery = result.dimensions.iter().find(|d| d.name == "Recovery").unwrap();
    assert!((recovery.score - 1.0).abs() < 1e-9);

    // One reversal out of two decisions drags decision quality down.
    let decisions = result.dimensions.iter().find(|d| d.name == "Decision quality").unwrap();
    assert!(decisions.score < 0.5);
}

#[test]
fn lint_errors_reach_the_board_with_emit() {
    let project = lived_in_project();
    // Plant a contradiction: prescriptive learnings vs a warning elsewhere.
    project.write_decisions(&[
        "éviter de chiffrer les exports de données clients, trop lent",
    ]);

    let report = lint::lint_memory(&project.paths);
    assert!(report.error_count() >= 1);

    let run_report = orchestrator::run(&project.paths, &RunOptions { emit: true, ..Default::default() });
    let lint_phase = run_report.phases.iter().find(|p| p.name == "memory-lint").unwrap();
    assert!(lint_phase.data["emitted"].as_u64().unwrap() >= 1);

    let board = stigmergy::load_board(&project.paths);
    let alerts: Vec<_> = board.pheromones.iter().filter(|p| p.emitter == "memory-lint").collect();
    assert!(!alerts.is_empty());
    assert!(alerts.iter().all(|p| p.text.starts_with("[memory-lint]")));
}

#[test]
fn json_contract_is_stable() {
    let project = lived_in_project();
    let report = orchestrator::run(&project.paths, &RunOptions::default());
    let value = orchestrator::report_to_json(&report);

    for phase in ["dream", "stigmergy", "antifragile", "darwinism", "memory-lint"] {
        assert!(value["phases"][phase]["status"].is_string(), "missing phase {}", phase);
        assert!(value["phases"][phase]["duration_ms"].is_number());
    }
    assert!(value["phases"]["darwinism"]["data"]["agents"]["dev"]["fitness"].is_number());
}
