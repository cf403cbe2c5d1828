//! `ganglion darwinism` — agent fitness and evolution.

use anyhow::Result;
use clap::Subcommand;

use ganglion_core::darwinism::{
    self, evaluate_generation, render_evaluate, render_evolve, render_history, render_leaderboard,
    render_lineage,
};
use ganglion_core::ProjectPaths;

#[derive(Subcommand)]
pub enum DarwinismCommands {
    /// Evaluate the fitness of every agent
    Evaluate {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Ranked table of the last recorded generation
    Leaderboard,

    /// Evaluate and propose evolutionary actions
    Evolve {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Preview without recording a generation
        #[arg(long)]
        dry_run: bool,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Generation history
    History,

    /// Evolution of one agent across generations
    Lineage {
        /// Agent id
        #[arg(long)]
        agent: String,
    },
}

pub fn run(paths: &ProjectPaths, command: DarwinismCommands) -> Result<i32> {
    match command {
        DarwinismCommands::Evaluate { since, json } => {
            let (scores, _actions) = evaluate_generation(paths, since.as_deref(), false)?;
            if scores.is_empty() {
                println!("No agent found in the trace.");
                return Ok(0);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&scores)?);
            } else {
                let generation = scores[0].generation;
                println!("{}", render_evaluate(&scores, generation));
                println!("{}", render_leaderboard(&scores));
            }
            Ok(0)
        }

        DarwinismCommands::Leaderboard => {
            let history = darwinism::load_history(paths);
            match history.last() {
                Some(record) => println!("{}", render_leaderboard(&record.scores)),
                None => println!("No history yet. Run 'evaluate' first."),
            }
            Ok(0)
        }

        DarwinismCommands::Evolve { since, dry_run, json } => {
            let (_scores, actions) = evaluate_generation(paths, since.as_deref(), dry_run)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&actions)?);
            } else {
                println!("{}", render_evolve(&actions, dry_run));
            }
            Ok(0)
        }

        DarwinismCommands::History => {
            let history = darwinism::load_history(paths);
            println!("{}", render_history(&history));
            Ok(0)
        }

        DarwinismCommands::Lineage { agent } => {
            let history = darwinism::load_history(paths);
            println!("{}", render_lineage(&agent, &history));
            Ok(0)
        }
    }
}
