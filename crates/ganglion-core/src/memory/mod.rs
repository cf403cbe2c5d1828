//! Memory store
//!
//! Single source of truth for the on-disk memory tree. Every subsystem
//! resolves file locations through [`ProjectPaths`] and persists JSON
//! through the atomic write helpers (temp file + rename), so an
//! interrupted run never leaves a torn board or history file behind.
//!
//! Layout, relative to the project root:
//!
//! ```text
//! _bmad/_memory/
//!   agent-learnings/<agent>.md
//!   decisions-log.md
//!   failure-museum.md
//!   contradiction-log.md
//!   shared-context.md
//!   dream-last-run
//! _bmad-output/
//!   BMAD_TRACE.md
//!   pheromone-board.json
//!   dream-journal.md / dream-memory.json / dream-archives/
//!   reasoning-stream.jsonl / reasoning-stream-compacted.md
//!   antifragile-history.json / darwinism-history.json
//!   consensus-history.json
//!   dna-proposals/ / forge-proposals/
//!   migration-bundle.json
//! ```

pub mod sources;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Relative memory tree root.
pub const MEMORY_DIR: &str = "_bmad/_memory";
/// Relative output tree root.
pub const OUTPUT_DIR: &str = "_bmad-output";

// ============================================================================
// ERRORS
// ============================================================================

/// Errors surfaced by the core. Read paths degrade to empty results instead
/// of erroring; these variants cover writes and explicit load contracts.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a valid migration bundle: {0}")]
    InvalidBundle(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Core result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// PROJECT PATHS
// ============================================================================

/// Resolves every known memory file from a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root.join(MEMORY_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn learnings_dir(&self) -> PathBuf {
        self.memory_dir().join("agent-learnings")
    }

    pub fn decisions_log(&self) -> PathBuf {
        self.memory_dir().join("decisions-log.md")
    }

    pub fn failure_museum(&self) -> PathBuf {
        self.memory_dir().join("failure-museum.md")
    }

    pub fn contradiction_log(&self) -> PathBuf {
        self.memory_dir().join("contradiction-log.md")
    }

    pub fn shared_context(&self) -> PathBuf {
        self.memory_dir().join("shared-context.md")
    }

    pub fn migrated_rules(&self) -> PathBuf {
        self.memory_dir().join("migrated-rules.md")
    }

    pub fn dream_last_run(&self) -> PathBuf {
        self.memory_dir().join("dream-last-run")
    }

    pub fn semantic_store(&self) -> PathBuf {
        self.memory_dir().join("semantic-memory.json")
    }

    pub fn trace(&self) -> PathBuf {
        self.output_dir().join("BMAD_TRACE.md")
    }

    pub fn pheromone_board(&self) -> PathBuf {
        self.output_dir().join("pheromone-board.json")
    }

    pub fn dream_journal(&self) -> PathBuf {
        self.output_dir().join("dream-journal.md")
    }

    pub fn dream_archives(&self) -> PathBuf {
        self.output_dir().join("dream-archives")
    }

    pub fn dream_memory(&self) -> PathBuf {
        self.output_dir().join("dream-memory.json")
    }

    pub fn reasoning_stream(&self) -> PathBuf {
        self.output_dir().join("reasoning-stream.jsonl")
    }

    pub fn reasoning_compacted(&self) -> PathBuf {
        self.output_dir().join("reasoning-stream-compacted.md")
    }

    pub fn antifragile_history(&self) -> PathBuf {
        self.output_dir().join("antifragile-history.json")
    }

    pub fn darwinism_history(&self) -> PathBuf {
        self.output_dir().join("darwinism-history.json")
    }

    pub fn consensus_history(&self) -> PathBuf {
        self.output_dir().join("consensus-history.json")
    }

    pub fn dna_proposals(&self) -> PathBuf {
        self.output_dir().join("dna-proposals")
    }

    pub fn forge_proposals(&self) -> PathBuf {
        self.output_dir().join("forge-proposals")
    }

    pub fn migration_bundle(&self) -> PathBuf {
        self.output_dir().join("migration-bundle.json")
    }

    pub fn project_context(&self) -> PathBuf {
        self.root.join("project-context.yaml")
    }
}

// ============================================================================
// ATOMIC PERSISTENCE
// ============================================================================

/// Write `value` as pretty-printed JSON through a sibling temp file.
/// The rename makes the update all-or-nothing.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_text_atomic(path, &content)
}

/// Write text through a sibling temp file and rename over the target.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Read and deserialize a JSON file. Missing or corrupt files yield `None`;
/// corruption is logged at debug level, never propagated.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring unreadable JSON file");
            None
        }
    }
}

// ============================================================================
// PROJECT CONTEXT
// ============================================================================

/// Typed view of `project-context.yaml`, loaded once and passed down.
/// All fields are optional; a missing or unparsable file yields defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub name: Option<String>,
    pub user: Option<String>,
    pub agents: Vec<String>,
    pub collection_prefix: Option<String>,
}

impl ProjectContext {
    /// Load the project context, degrading to defaults on any failure.
    pub fn load(paths: &ProjectPaths) -> Self {
        let path = paths.project_context();
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_yaml::from_str(&content) {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable project context");
                Self::default()
            }
        }
    }

    /// Project name from the context, falling back to the directory name.
    pub fn project_name(&self, paths: &ProjectPaths) -> String {
        if let Some(name) = &self.name
            && !name.trim().is_empty()
        {
            return name.trim().to_string();
        }
        paths
            .root()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        count: u32,
        label: String,
    }

    #[test]
    fn test_paths_are_project_relative() {
        let paths = ProjectPaths::new("/tmp/project");
        assert!(paths.pheromone_board().ends_with("_bmad-output/pheromone-board.json"));
        assert!(paths.decisions_log().ends_with("_bmad/_memory/decisions-log.md"));
        assert!(paths.dream_last_run().ends_with("_bmad/_memory/dream-last-run"));
    }

    #[test]
    fn test_json_atomic_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/sample.json");
        let value = Sample { count: 3, label: "ok".into() };

        write_json_atomic(&path, &value).unwrap();
        let loaded: Sample = read_json(&path).unwrap();
        assert_eq!(loaded, value);

        // No temp file left behind
        assert!(!path.with_file_name(".sample.json.tmp").exists());
        // Pretty-printed, LF-terminated
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("\n  "));
    }

    #[test]
    fn test_read_json_degrades_on_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_json::<Sample>(&path).is_none());
        assert!(read_json::<Sample>(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn test_project_context_defaults_and_name() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let ctx = ProjectContext::load(&paths);
        assert!(ctx.name.is_none());
        // Falls back to directory name
        let expected = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(ctx.project_name(&paths), expected);

        std::fs::write(
            paths.project_context(),
            "name: \"orbital\"\nagents:\n  - dev\n  - qa\n",
        )
        .unwrap();
        let ctx = ProjectContext::load(&paths);
        assert_eq!(ctx.project_name(&paths), "orbital");
        assert_eq!(ctx.agents, vec!["dev", "qa"]);
    }
}
