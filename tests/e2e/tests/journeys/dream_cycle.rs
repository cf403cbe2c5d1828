//! Journey: repeated dreams over the same project — persistence tracking,
//! journal rotation, and the stigmergy feedback loop.

use ganglion_core::dream::{DreamRunOptions, run_dream_cycle};
use ganglion_core::stigmergy::{self, PheromoneType};
use ganglion_e2e_tests::TestProject;

fn seeded_project() -> TestProject {
    let project = TestProject::new();
    // The same sentence in two sources of different kinds guarantees one
    // full-confidence connection insight.
    project.write_learnings(
        "dev",
        &["database caching performance optimization layer", "TODO automatiser le déploiement"],
    );
    project.write_decisions(&["database caching performance optimization layer"]);
    project
}

fn options() -> DreamRunOptions {
    DreamRunOptions { validate: true, ..Default::default() }
}

#[test]
fn first_dream_finds_connection_and_writes_journal() {
    let project = seeded_project();

    let outcome = run_dream_cycle(&project.paths, &options()).unwrap();
    assert!(!outcome.insights.is_empty());

    let connection = outcome
        .insights
        .iter()
        .find(|i| i.title.starts_with("Connection"))
        .expect("cross-kind connection insight");
    assert_eq!(connection.confidence, 1.0);
    assert_eq!(connection.sources.len(), 2);

    // Every insight is anchored in collected sources with a usable text
    for insight in &outcome.insights {
        assert!(insight.confidence > 0.0);
        assert!(insight.description.chars().count() >= 10);
        for source in &insight.sources {
            assert!(outcome.sources.iter().any(|s| &s.name == source));
        }
    }

    // Disk side effects: journal, registry, incremental stamp
    assert!(project.paths.dream_journal().exists());
    assert!(project.paths.dream_memory().exists());
    assert!(project.paths.dream_last_run().exists());

    let diff = outcome.diff.unwrap();
    assert_eq!(diff.new.len(), outcome.insights.len());
    assert!(diff.persistent.is_empty());
    assert!(diff.resolved.is_empty());
}

#[test]
fn second_dream_reports_persistence_third_reports_resolution() {
    let project = seeded_project();

    let first = run_dream_cycle(&project.paths, &options()).unwrap();
    let first_count = first.insights.len();
    assert!(first_count > 0);

    // Same sources, same insights: all persistent, confidence boosted.
    let second = run_dream_cycle(&project.paths, &options()).unwrap();
    let diff = second.diff.unwrap();
    assert_eq!(diff.new.len(), 0);
    assert_eq!(diff.persistent.len(), first_count);
    assert!(diff.resolved.is_empty());
    for (before, after) in first.insights.iter().zip(diff.persistent.iter()) {
        let expected = (before.confidence + 0.15).min(1.0);
        assert!((after.confidence - expected).abs() < 1e-9);
    }

    // Drop the decisions source: the connection disappears and is
    // reported resolved (it had been seen twice).
    std::fs::remove_file(project.paths.decisions_log()).unwrap();
    let third = run_dream_cycle(&project.paths, &options()).unwrap();
    let diff = third.diff.unwrap();
    assert!(
        diff.resolved.iter().any(|sig| sig.starts_with("connection:")),
        "resolved signatures were {:?}",
        diff.resolved
    );

    // The previous journals were rotated, not lost.
    let archives = std::fs::read_dir(project.paths.dream_archives()).unwrap().count();
    assert!(archives >= 1);
}

#[test]
fn emitted_insights_become_pheromones_once() {
    let project = seeded_project();
    let options = DreamRunOptions { validate: true, emit: true, ..Default::default() };

    let outcome = run_dream_cycle(&project.paths, &options).unwrap();
    assert!(outcome.emitted > 0);

    let board = stigmergy::load_board(&project.paths);
    let dream_signals: Vec<_> =
        board.pheromones.iter().filter(|p| p.emitter == "dream-mode").collect();
    assert_eq!(dream_signals.len(), outcome.emitted);
    for signal in &dream_signals {
        assert!(signal.text.starts_with("[dream]"));
        assert!(signal.intensity <= 0.9);
        assert!(signal.tags.contains(&"auto-dream".to_string()));
    }
    // The connection maps to PROGRESS
    assert!(dream_signals.iter().any(|p| p.pheromone_type == PheromoneType::Progress));

    // A second emitting dream adds nothing: texts are already active.
    let before = stigmergy::load_board(&project.paths).pheromones.len();
    let second = run_dream_cycle(&project.paths, &options).unwrap();
    assert_eq!(second.emitted, 0);
    assert_eq!(stigmergy::load_board(&project.paths).pheromones.len(), before);
}

#[test]
fn quick_mode_and_incremental_stamp() {
    let project = seeded_project();

    // `auto` with no stamp behaves like no filter.
    let options = DreamRunOptions {
        since: Some("auto".to_string()),
        validate: true,
        quick: true,
        ..Default::default()
    };
    let outcome = run_dream_cycle(&project.paths, &options).unwrap();
    assert!(outcome.since.is_none());
    // Quick mode skips the quadratic passes entirely.
    assert!(outcome.insights.iter().all(|i| !i.title.starts_with("Connection")));
    assert!(outcome.insights.len() <= 5);

    // The stamp now exists, so the next auto run resolves a date.
    let outcome = run_dream_cycle(&project.paths, &options).unwrap();
    assert!(outcome.since.is_some());
}

#[test]
fn empty_project_dreams_nothing() {
    let project = TestProject::new();
    let outcome = run_dream_cycle(&project.paths, &options()).unwrap();
    assert!(outcome.sources.is_empty());
    assert!(outcome.insights.is_empty());
    assert!(!project.paths.dream_journal().exists());
}
