//! Journey: the full life of coordination signals on a real board file.

use chrono::{Duration, Utc};
use ganglion_core::stigmergy::trails::{TrailKind, analyze_trails};
use ganglion_core::stigmergy::{
    self, DEFAULT_HALF_LIFE_HOURS, DETECTION_THRESHOLD, PheromoneType, SenseFilter,
};
use ganglion_e2e_tests::TestProject;

#[test]
fn emit_amplify_evaporate_roundtrip() {
    let project = TestProject::new();
    let t0 = Utc::now() - Duration::hours(720);

    // An agent drops a full-strength NEED at src/auth, 30 days ago.
    let mut board = stigmergy::load_board(&project.paths);
    let pheromone = stigmergy::emit_pheromone_at(
        &mut board,
        PheromoneType::Need,
        "src/auth",
        "security review required",
        "dev",
        vec!["security".to_string()],
        1.0,
        &t0.to_rfc3339(),
    );
    stigmergy::save_board(&project.paths, &board).unwrap();

    // One half-life later the signal reads at half strength.
    let mut board = stigmergy::load_board(&project.paths);
    let reloaded = board.find(&pheromone.pheromone_id).unwrap();
    let at_half_life =
        stigmergy::compute_current_intensity(reloaded, DEFAULT_HALF_LIFE_HOURS, t0 + Duration::hours(72));
    assert!((at_half_life - 0.5).abs() < 1e-6);

    // QA amplifies from a weakened base.
    board.pheromones[0].intensity = 0.5;
    let amplified = stigmergy::amplify_pheromone(&mut board, &pheromone.pheromone_id, "qa").unwrap();
    assert!((amplified.intensity - 0.7).abs() < 1e-9);
    assert_eq!(amplified.reinforcements, 1);
    assert_eq!(amplified.reinforced_by, vec!["qa"]);
    stigmergy::save_board(&project.paths, &board).unwrap();

    // Ten half-lives after emission the signal is dead and evaporates.
    let now = t0 + Duration::hours(720);
    let mut board = stigmergy::load_board(&project.paths);
    let current =
        stigmergy::compute_current_intensity(&board.pheromones[0], DEFAULT_HALF_LIFE_HOURS, now);
    assert!(current < DETECTION_THRESHOLD);

    let evaporated = stigmergy::evaporate(&mut board, now);
    assert_eq!(evaporated, 1);
    assert_eq!(board.total_evaporated, 1);
    assert!(board.pheromones.is_empty());
    stigmergy::save_board(&project.paths, &board).unwrap();

    // Evaporating again at the same reference time changes nothing.
    let mut board = stigmergy::load_board(&project.paths);
    assert_eq!(stigmergy::evaporate(&mut board, now), 0);
    assert_eq!(board.total_evaporated, 1);
    assert_eq!(board.total_emitted, 1);
}

#[test]
fn trail_patterns_over_a_busy_board() {
    let project = TestProject::new();
    let now = Utc::now();

    let mut board = stigmergy::load_board(&project.paths);
    for (agent, text) in [("alice", "index missing"), ("bob", "migration running"), ("carol", "slow queries")] {
        stigmergy::emit_pheromone(&mut board, PheromoneType::Need, "src/db", text, agent, vec![], 0.8);
    }
    stigmergy::emit_pheromone(&mut board, PheromoneType::Block, "src/api", "waiting on schema", "alice", vec![], 0.8);
    stigmergy::emit_pheromone(&mut board, PheromoneType::Block, "src/api", "auth unresolved", "bob", vec![], 0.8);
    stigmergy::save_board(&project.paths, &board).unwrap();

    let board = stigmergy::load_board(&project.paths);
    let patterns = analyze_trails(&board, now);

    let count = |kind: TrailKind, location: &str| {
        patterns
            .iter()
            .filter(|p| p.pattern_type == kind && p.location == location)
            .count()
    };
    assert_eq!(count(TrailKind::HotZone, "src/db"), 1);
    assert_eq!(count(TrailKind::Convergence, "src/db"), 1);
    assert_eq!(count(TrailKind::Bottleneck, "src/api"), 1);
    assert_eq!(count(TrailKind::Convergence, "src/api"), 1);
    // Dedup by (kind, location): nothing appears twice
    let mut keys: Vec<String> = patterns
        .iter()
        .map(|p| format!("{}:{}", p.pattern_type, p.location))
        .collect();
    keys.sort();
    let before = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), before);
}

#[test]
fn sensing_respects_threshold_and_resolution() {
    let project = TestProject::new();
    let now = Utc::now();

    let mut board = stigmergy::load_board(&project.paths);
    stigmergy::emit_pheromone(&mut board, PheromoneType::Need, "src/a", "exactly at threshold", "dev", vec![], DETECTION_THRESHOLD);
    stigmergy::emit_pheromone(&mut board, PheromoneType::Need, "src/b", "invisible", "dev", vec![], 0.0);
    let done = stigmergy::emit_pheromone(&mut board, PheromoneType::Complete, "src/c", "shipped", "dev", vec![], 0.9);
    stigmergy::resolve_pheromone(&mut board, &done.pheromone_id, "qa");

    let sensed = stigmergy::sense_pheromones(&board, &SenseFilter::default(), now);
    assert_eq!(sensed.len(), 1);
    assert_eq!(sensed[0].0.text, "exactly at threshold");

    let with_resolved = stigmergy::sense_pheromones(
        &board,
        &SenseFilter { include_resolved: true, ..Default::default() },
        now,
    );
    assert_eq!(with_resolved.len(), 2);
}
