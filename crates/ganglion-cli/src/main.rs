//! Ganglion CLI
//!
//! One binary, one subcommand per nervous-system tool:
//!
//! - `pheromone` — the stigmergic coordination board
//! - `dream` — off-session consolidation and insight generation
//! - `reasoning` — the typed inference log
//! - `antifragile` — composite resilience scoring
//! - `darwinism` — per-agent fitness and evolution
//! - `memory-lint` — cross-file consistency checks
//! - `run` — the full orchestrated cycle
//! - `migrate` — cross-project bundle export/import
//!
//! Exit codes: 0 on success, 1 on user errors, unknown ids, lint errors
//! or failed orchestrator phases.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ganglion_core::ProjectPaths;

/// Ganglion — nervous system for multi-agent projects
#[derive(Parser)]
#[command(name = "ganglion")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Meta-cognitive coordination layer for multi-agent development")]
#[command(long_about = "Ganglion observes agent activity traces, persists what agents learn, \
detects emergent coordination patterns, and feeds signals back through a shared pheromone board.")]
struct Cli {
    /// Project root holding the _bmad/_memory tree
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stigmergic pheromone board
    Pheromone {
        #[command(subcommand)]
        command: commands::pheromone::PheromoneCommands,
    },

    /// Off-session consolidation and emergent insights
    Dream(commands::dream::DreamArgs),

    /// Structured reasoning stream
    Reasoning {
        #[command(subcommand)]
        command: commands::reasoning::ReasoningCommands,
    },

    /// Anti-fragility score
    Antifragile(commands::antifragile::AntifragileArgs),

    /// Agent fitness and evolution
    Darwinism {
        #[command(subcommand)]
        command: commands::darwinism::DarwinismCommands,
    },

    /// Memory consistency linter
    #[command(name = "memory-lint")]
    MemoryLint(commands::lint::LintArgs),

    /// Run the full nervous-system cycle
    Run(commands::orchestrate::RunArgs),

    /// Cross-project migration bundles
    Migrate {
        #[command(subcommand)]
        command: commands::migrate::MigrateCommands,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = ProjectPaths::new(&cli.project_root);
    tracing::debug!(project_root = %cli.project_root.display(), "ganglion starting");

    let outcome = match cli.command {
        Commands::Pheromone { command } => commands::pheromone::run(&paths, command),
        Commands::Dream(args) => commands::dream::run(&paths, args),
        Commands::Reasoning { command } => commands::reasoning::run(&paths, command),
        Commands::Antifragile(args) => commands::antifragile::run(&paths, args),
        Commands::Darwinism { command } => commands::darwinism::run(&paths, command),
        Commands::MemoryLint(args) => commands::lint::run(&paths, args),
        Commands::Run(args) => commands::orchestrate::run(&paths, args),
        Commands::Migrate { command } => commands::migrate::run(&paths, command),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
