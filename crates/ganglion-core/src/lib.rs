//! # Ganglion Core
//!
//! Meta-cognitive coordination engine for multi-agent development
//! frameworks. Agents work on a shared codebase; Ganglion is the nervous
//! system around them — it observes their traces, persists what they
//! learn, detects emergent coordination, and feeds signals back.
//!
//! Subsystems, all sharing one on-disk memory model:
//!
//! - **Stigmergy**: typed decaying pheromones agents drop and sense —
//!   indirect coordination through the environment, half-life decay,
//!   amplification, trail-pattern detection.
//! - **Dream engine**: off-session consolidation that correlates memory
//!   sources into cross-domain insights, tracks their persistence across
//!   runs, and can re-enter the board as pheromones (feedback loop).
//! - **Anti-fragility scorer**: six weighted dimensions measuring whether
//!   the system learns from failure.
//! - **Agent darwinism**: per-agent fitness across generations with
//!   evolutionary action proposals.
//! - **Reasoning stream**: append-only typed log of inference steps —
//!   hypotheses, doubts, assumptions, alternatives — with lifecycle.
//! - **Memory linter**: cross-file consistency checks (contradictions,
//!   duplicates, orphans, chronology).
//! - **Orchestrator**: one invocation running all of the above in order.
//! - **Bundle codec**: portable export/import for cross-project
//!   pollination.
//!
//! All state lives on disk under `_bmad/_memory` and `_bmad-output`;
//! there is no in-memory broker and no server. Collectors never fail on
//! missing or corrupt input — the worst case is a shorter stream.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ganglion_core::prelude::*;
//!
//! let paths = ProjectPaths::new(".");
//! let mut board = stigmergy::load_board(&paths);
//! stigmergy::emit_pheromone(
//!     &mut board,
//!     PheromoneType::Need,
//!     "src/auth",
//!     "security review required",
//!     "dev",
//!     vec![],
//!     0.7,
//! );
//! stigmergy::save_board(&paths, &board)?;
//!
//! let report = orchestrator::run(&paths, &Default::default());
//! println!("{}", orchestrator::render_report(&report));
//! ```
//!
//! ## Feature flags
//!
//! - `remote-probe` (default): HTTP reachability probe for remote
//!   semantic backends (Ollama / Qdrant); without it the factory always
//!   uses the local JSON store.

// ============================================================================
// MODULES
// ============================================================================

pub mod antifragile;
pub mod bundle;
pub mod darwinism;
pub mod dream;
pub mod lint;
pub mod memory;
pub mod orchestrator;
pub mod reasoning;
pub mod semantic;
pub mod similarity;
pub mod stigmergy;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Store and errors
pub use memory::{CoreError, ProjectContext, ProjectPaths, Result};

// Source collection
pub use memory::sources::{MemorySource, SourceEntry, SourceKind, collect_sources};

// Stigmergy
pub use stigmergy::trails::{TrailKind, TrailPattern, analyze_trails};
pub use stigmergy::{
    DEFAULT_HALF_LIFE_HOURS, DEFAULT_INTENSITY, DETECTION_THRESHOLD, Pheromone, PheromoneBoard,
    PheromoneType, REINFORCEMENT_BOOST, SenseFilter, amplify_pheromone, compute_current_intensity,
    emit_pheromone, evaporate, resolve_pheromone, sense_pheromones,
};

// Dream engine
pub use dream::memory::{DreamDiff, DreamMemory, DreamMemoryEntry, insight_signature};
pub use dream::{
    DreamInsight, DreamOutcome, DreamRunOptions, InsightCategory, MAX_INSIGHTS,
    QUICK_MAX_INSIGHTS, dream as run_dream, run_dream_cycle,
};

// Reasoning stream
pub use reasoning::{
    ReasoningEntry, ReasoningStatus, ReasoningType, StreamAnalysis, StreamFilter, analyze_stream,
    compact_stream, log_entry, read_stream, update_entry_status,
};

// Anti-fragility
pub use antifragile::{
    AntifragileLevel, AntifragileResult, DimensionScore, compute_antifragile_score,
};

// Darwinism
pub use darwinism::{
    EvolutionAction, EvolutionActionKind, EvolutionLevel, FitnessDimensions, FitnessScore,
    GenerationRecord, evaluate_generation,
};

// Memory lint
pub use lint::{LintCategory, LintIssue, LintReport, LintSeverity, lint_memory};

// Orchestrator
pub use orchestrator::{OrchestratorReport, PhaseResult, PhaseStatus, RunOptions};

// Bundle codec
pub use bundle::{
    BUNDLE_MAGIC, BundleManifest, ExportedLearning, ExportedRule, ImportResult, MigrationBundle,
    create_bundle, import_bundle, load_bundle, save_bundle,
};

// Semantic backends
pub use semantic::{BackendKind, BackendStatus, SemanticBackend, SemanticItem, select_backend};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::memory::sources::collect_sources;
    pub use crate::{
        AntifragileResult, CoreError, DreamInsight, DreamRunOptions, EvolutionLevel, FitnessScore,
        LintReport, MemorySource, OrchestratorReport, Pheromone, PheromoneBoard, PheromoneType,
        ProjectContext, ProjectPaths, ReasoningEntry, ReasoningType, Result, RunOptions,
        SourceKind, TrailPattern,
    };
    pub use crate::{antifragile, bundle, darwinism, dream, lint, orchestrator, reasoning, stigmergy};
}
