//! `ganglion migrate` — cross-project bundle export/import.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use ganglion_core::bundle::{
    self, ARTIFACT_TYPES, create_bundle, import_bundle, load_bundle, render_diff, render_import_result,
    render_inspect, save_bundle,
};
use ganglion_core::ProjectPaths;

use super::split_csv;

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Export a bundle from this project
    Export {
        /// Output file
        #[arg(long, default_value = "_bmad-output/migration-bundle.json")]
        output: PathBuf,
        /// Restrict to artifact kinds (comma-separated)
        #[arg(long)]
        only: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
    },

    /// Import a bundle into this project
    Import {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,
        /// Preview without modifying the project
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect a bundle's contents
    Inspect {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Compare a bundle against the current project
    Diff {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,
    },
}

fn resolve_bundle(paths: &ProjectPaths, bundle_path: &PathBuf) -> Result<bundle::MigrationBundle> {
    let path = if bundle_path.is_absolute() {
        bundle_path.clone()
    } else {
        paths.root().join(bundle_path)
    };
    if !path.exists() {
        anyhow::bail!("bundle not found: {}", path.display());
    }
    Ok(load_bundle(&path)?)
}

pub fn run(paths: &ProjectPaths, command: MigrateCommands) -> Result<i32> {
    match command {
        MigrateCommands::Export { output, only, since } => {
            let only_set: Option<HashSet<String>> = match only {
                Some(raw) => {
                    let set: HashSet<String> = split_csv(&raw).into_iter().collect();
                    let invalid: Vec<&String> =
                        set.iter().filter(|t| !ARTIFACT_TYPES.contains(&t.as_str())).collect();
                    if !invalid.is_empty() {
                        eprintln!(
                            "{} Unknown artifact kinds: {}",
                            "❌".red(),
                            invalid.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                        );
                        eprintln!("   Valid: {}", ARTIFACT_TYPES.join(", "));
                        return Ok(1);
                    }
                    Some(set)
                }
                None => None,
            };

            let bundle = create_bundle(paths, only_set.as_ref(), since.as_deref());
            let output = if output.is_absolute() { output } else { paths.root().join(output) };
            save_bundle(&bundle, &output)?;

            println!("📦 Bundle exported: {}", output.display().to_string().bold());
            println!("   Source: {}", bundle.manifest.source_project);
            let kinds = if bundle.manifest.artifact_types.is_empty() {
                "none".to_string()
            } else {
                bundle.manifest.artifact_types.join(", ")
            };
            println!("   Kinds: {}", kinds);
            println!("   Items: {}", bundle.manifest.total_items);
            Ok(0)
        }

        MigrateCommands::Import { bundle, dry_run } => {
            let loaded = resolve_bundle(paths, &bundle)?;
            let result = import_bundle(&loaded, paths, dry_run)?;
            println!("{}", render_import_result(&result, dry_run));
            Ok(0)
        }

        MigrateCommands::Inspect { bundle } => {
            let loaded = resolve_bundle(paths, &bundle)?;
            println!("{}", render_inspect(&loaded));
            Ok(0)
        }

        MigrateCommands::Diff { bundle } => {
            let loaded = resolve_bundle(paths, &bundle)?;
            println!("{}", render_diff(&loaded, paths));
            Ok(0)
        }
    }
}
