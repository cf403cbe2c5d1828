//! `ganglion pheromone` — the stigmergic coordination board.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use ganglion_core::stigmergy::{
    self, DEFAULT_INTENSITY, PheromoneType, SenseFilter, render_evaporate, render_landscape,
    render_sense,
};
use ganglion_core::stigmergy::trails::{analyze_trails, render_trails};
use ganglion_core::ProjectPaths;

use super::split_csv;

#[derive(Subcommand)]
pub enum PheromoneCommands {
    /// Deposit a pheromone
    Emit {
        /// Signal type (NEED, ALERT, OPPORTUNITY, PROGRESS, COMPLETE, BLOCK)
        #[arg(long = "type")]
        ptype: String,
        /// Affected zone (file, domain, feature)
        #[arg(long)]
        location: String,
        /// Signal description
        #[arg(long)]
        text: String,
        /// Emitting agent
        #[arg(long)]
        agent: String,
        /// Tags (comma-separated)
        #[arg(long, default_value = "")]
        tags: String,
        /// Initial intensity (0.0-1.0)
        #[arg(long, default_value_t = DEFAULT_INTENSITY)]
        intensity: f64,
    },

    /// Detect active pheromones
    Sense {
        /// Filter by type
        #[arg(long = "type")]
        ptype: Option<String>,
        /// Filter by zone (substring)
        #[arg(long)]
        location: Option<String>,
        /// Filter by tag (substring)
        #[arg(long)]
        tag: Option<String>,
        /// Filter by emitter
        #[arg(long)]
        emitter: Option<String>,
        /// Include resolved pheromones
        #[arg(long)]
        include_resolved: bool,
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Reinforce an existing pheromone
    Amplify {
        /// Pheromone id (PH-xxxxxxxx)
        #[arg(long)]
        id: String,
        /// Reinforcing agent
        #[arg(long)]
        agent: String,
    },

    /// Mark a pheromone as resolved
    Resolve {
        /// Pheromone id (PH-xxxxxxxx)
        #[arg(long)]
        id: String,
        /// Resolving agent
        #[arg(long)]
        agent: String,
    },

    /// Full map of the pheromone landscape
    Landscape,

    /// Emergent coordination patterns
    Trails,

    /// Clean up dead signals
    Evaporate {
        /// Preview without modifying the board
        #[arg(long)]
        dry_run: bool,
    },

    /// Quick statistics
    Stats,
}

fn parse_type(value: &str) -> Result<PheromoneType> {
    let upper = value.to_uppercase();
    let parsed = PheromoneType::parse_name(&upper);
    if parsed.as_str() != upper {
        anyhow::bail!(
            "unknown pheromone type '{}' (expected NEED, ALERT, OPPORTUNITY, PROGRESS, COMPLETE or BLOCK)",
            value
        );
    }
    Ok(parsed)
}

pub fn run(paths: &ProjectPaths, command: PheromoneCommands) -> Result<i32> {
    let mut board = stigmergy::load_board(paths);
    let now = Utc::now();

    match command {
        PheromoneCommands::Emit { ptype, location, text, agent, tags, intensity } => {
            let ptype = parse_type(&ptype)?;
            let pheromone = stigmergy::emit_pheromone(
                &mut board,
                ptype,
                &location,
                &text,
                &agent,
                split_csv(&tags),
                intensity,
            );
            stigmergy::save_board(paths, &board)?;
            println!("{} Pheromone emitted: {}", ptype.icon(), pheromone.pheromone_id.bold());
            println!("   Type: {}", pheromone.pheromone_type);
            println!("   Zone: {}", pheromone.location);
            println!("   Signal: {}", pheromone.text);
            println!("   Intensity: {:.0}%", pheromone.intensity * 100.0);
            Ok(0)
        }

        PheromoneCommands::Sense { ptype, location, tag, emitter, include_resolved, json } => {
            let filter = SenseFilter {
                ptype: ptype.as_deref().map(parse_type).transpose()?,
                location,
                tag,
                emitter,
                include_resolved,
            };
            let items = stigmergy::sense_pheromones(&board, &filter, now);
            if json {
                let out: Vec<_> = items
                    .iter()
                    .map(|(p, current)| {
                        json!({
                            "pheromone": p,
                            "current_intensity": (current * 10_000.0).round() / 10_000.0,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", render_sense(&items));
            }
            Ok(0)
        }

        PheromoneCommands::Amplify { id, agent } => {
            match stigmergy::amplify_pheromone(&mut board, &id, &agent) {
                Some(pheromone) => {
                    let intensity = pheromone.intensity;
                    let reinforcements = pheromone.reinforcements;
                    stigmergy::save_board(paths, &board)?;
                    println!("⬆️ Pheromone {} reinforced by {}", id.bold(), agent);
                    println!("   New intensity: {:.0}%", intensity * 100.0);
                    println!("   Reinforcements: {}", reinforcements);
                    Ok(0)
                }
                None => {
                    eprintln!("{} Pheromone {} not found", "❌".red(), id);
                    Ok(1)
                }
            }
        }

        PheromoneCommands::Resolve { id, agent } => {
            match stigmergy::resolve_pheromone(&mut board, &id, &agent) {
                Some(_) => {
                    stigmergy::save_board(paths, &board)?;
                    println!("✅ Pheromone {} resolved by {}", id.bold(), agent);
                    Ok(0)
                }
                None => {
                    eprintln!("{} Pheromone {} not found", "❌".red(), id);
                    Ok(1)
                }
            }
        }

        PheromoneCommands::Landscape => {
            println!("{}", render_landscape(&board, now));
            Ok(0)
        }

        PheromoneCommands::Trails => {
            let patterns = analyze_trails(&board, now);
            println!("{}", render_trails(&patterns));
            Ok(0)
        }

        PheromoneCommands::Evaporate { dry_run } => {
            if dry_run {
                let mut preview = board.clone();
                let count = stigmergy::evaporate(&mut preview, now);
                println!("{}", render_evaporate(count, preview.pheromones.len(), true));
            } else {
                let count = stigmergy::evaporate(&mut board, now);
                stigmergy::save_board(paths, &board)?;
                println!("{}", render_evaporate(count, board.pheromones.len(), false));
            }
            Ok(0)
        }

        PheromoneCommands::Stats => {
            let active = stigmergy::sense_pheromones(&board, &SenseFilter::default(), now);
            let resolved = board.pheromones.iter().filter(|p| p.resolved).count();
            let max_reinforced = board.pheromones.iter().map(|p| p.reinforcements).max().unwrap_or(0);

            println!("{}", "# 📊 Stigmergy Statistics".bold());
            println!();
            println!("- Active signals: **{}**", active.len());
            println!("- Resolved: **{}**", resolved);
            println!("- Total emitted: **{}**", board.total_emitted);
            println!("- Total evaporated: **{}**", board.total_evaporated);
            println!("- Max reinforcements: **{}**", max_reinforced);
            if let Some((strongest, intensity)) = active.first() {
                println!(
                    "- Strongest signal: **{}** ({:.0}%)",
                    strongest.pheromone_id,
                    intensity * 100.0
                );
            }
            Ok(0)
        }
    }
}
