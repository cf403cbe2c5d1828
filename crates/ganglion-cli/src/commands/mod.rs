//! Subcommand handlers. Each returns the process exit code.

pub mod antifragile;
pub mod darwinism;
pub mod dream;
pub mod lint;
pub mod migrate;
pub mod orchestrate;
pub mod pheromone;
pub mod reasoning;

/// Split a comma-separated flag value into trimmed, non-empty parts.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
