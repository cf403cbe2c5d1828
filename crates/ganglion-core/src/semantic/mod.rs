//! Semantic memory backends
//!
//! The core treats semantic memory as a pluggable collaborator behind a
//! minimal contract: add, search, get_all, count, status. The in-tree
//! implementation is a local JSON store whose search reuses the keyword
//! similarity kernel — good enough for small projects and air-gapped
//! machines.
//!
//! The factory consults environment hints (`BMAD_OLLAMA_URL`,
//! `BMAD_QDRANT_URL`, `BMAD_QDRANT_API_KEY`). When a remote backend is
//! configured it is probed over HTTP with a short budget; unreachable or
//! unconfigured remotes fall back to the local store with a warning. The
//! remote clients themselves live outside the core.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::memory::{ProjectPaths, Result, read_json, write_json_atomic};
use crate::similarity::unigram_similarity;

/// Environment hints consulted by the factory.
pub const ENV_OLLAMA_URL: &str = "BMAD_OLLAMA_URL";
pub const ENV_QDRANT_URL: &str = "BMAD_QDRANT_URL";
pub const ENV_QDRANT_API_KEY: &str = "BMAD_QDRANT_API_KEY";

/// Probe budget for remote backends.
#[cfg(feature = "remote-probe")]
const PROBE_TIMEOUT_MS: u64 = 1500;

// ============================================================================
// CONTRACT
// ============================================================================

/// One stored memory item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A search hit with its score in [0, 1].
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub item: SemanticItem,
    pub score: f64,
}

/// Backend health, as reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Ready,
    Unreachable,
}

/// Minimal backend contract. Every component reading semantic memory goes
/// through this trait.
pub trait SemanticBackend {
    /// Human name for reports ("local", "qdrant", …).
    fn name(&self) -> &'static str;
    fn add(&mut self, item: SemanticItem) -> Result<()>;
    fn search(&self, query: &str, limit: usize) -> Vec<SemanticHit>;
    fn get_all(&self) -> Vec<SemanticItem>;
    fn count(&self) -> usize;
    fn status(&self) -> BackendStatus;
}

// ============================================================================
// LOCAL JSON STORE
// ============================================================================

/// Keyword-similarity store persisted at
/// `_bmad/_memory/semantic-memory.json`.
pub struct LocalStore {
    paths: ProjectPaths,
    items: Vec<SemanticItem>,
}

impl LocalStore {
    pub fn open(paths: &ProjectPaths) -> Self {
        let items = read_json(&paths.semantic_store()).unwrap_or_default();
        Self { paths: paths.clone(), items }
    }
}

impl SemanticBackend for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn add(&mut self, item: SemanticItem) -> Result<()> {
        self.items.retain(|existing| existing.id != item.id);
        self.items.push(item);
        write_json_atomic(&self.paths.semantic_store(), &self.items)
    }

    fn search(&self, query: &str, limit: usize) -> Vec<SemanticHit> {
        let mut hits: Vec<SemanticHit> = self
            .items
            .iter()
            .map(|item| SemanticHit {
                item: item.clone(),
                score: unigram_similarity(query, &item.text),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    fn get_all(&self) -> Vec<SemanticItem> {
        self.items.clone()
    }

    fn count(&self) -> usize {
        self.items.len()
    }

    fn status(&self) -> BackendStatus {
        BackendStatus::Ready
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Backend selection resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    /// Ollama embeddings + Qdrant storage.
    OllamaQdrant { ollama_url: String, qdrant_url: String },
    /// Qdrant with server-side embeddings.
    QdrantServer { qdrant_url: String },
}

/// Read the environment hints into a selection, without probing.
pub fn detect_backend_kind() -> BackendKind {
    let ollama = std::env::var(ENV_OLLAMA_URL).ok().filter(|v| !v.trim().is_empty());
    let qdrant = std::env::var(ENV_QDRANT_URL).ok().filter(|v| !v.trim().is_empty());

    match (ollama, qdrant) {
        (Some(ollama_url), Some(qdrant_url)) => BackendKind::OllamaQdrant { ollama_url, qdrant_url },
        (None, Some(qdrant_url)) => BackendKind::QdrantServer { qdrant_url },
        _ => BackendKind::Local,
    }
}

/// Probe a remote HTTP endpoint within the budget. Compiled out without
/// the `remote-probe` feature (the factory then always falls back).
#[cfg(feature = "remote-probe")]
fn probe(url: &str) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_millis(PROBE_TIMEOUT_MS))
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };
    client.get(url).send().map(|r| r.status().is_success() || r.status().is_client_error()).unwrap_or(false)
}

#[cfg(not(feature = "remote-probe"))]
fn probe(_url: &str) -> bool {
    false
}

/// Select a backend for the project. Remote configurations are probed;
/// on failure the local store is returned so callers never lose semantic
/// memory entirely.
pub fn select_backend(paths: &ProjectPaths) -> Box<dyn SemanticBackend> {
    match detect_backend_kind() {
        BackendKind::Local => Box::new(LocalStore::open(paths)),
        BackendKind::OllamaQdrant { ollama_url, qdrant_url } => {
            if probe(&ollama_url) && probe(&qdrant_url) {
                warn!(
                    ollama = %ollama_url,
                    qdrant = %qdrant_url,
                    "remote semantic backend reachable but no client is registered; using local store"
                );
            } else {
                warn!(
                    ollama = %ollama_url,
                    qdrant = %qdrant_url,
                    "remote semantic backend unreachable; falling back to local store"
                );
            }
            Box::new(LocalStore::open(paths))
        }
        BackendKind::QdrantServer { qdrant_url } => {
            if !probe(&qdrant_url) {
                warn!(qdrant = %qdrant_url, "qdrant unreachable; falling back to local store");
            } else {
                warn!(qdrant = %qdrant_url, "qdrant reachable but no client is registered; using local store");
            }
            Box::new(LocalStore::open(paths))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(id: &str, text: &str) -> SemanticItem {
        SemanticItem { id: id.to_string(), text: text.to_string(), metadata: BTreeMap::new() }
    }

    #[test]
    fn test_local_store_add_persists() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let mut store = LocalStore::open(&paths);
        assert_eq!(store.count(), 0);
        store.add(item("a", "database connection pooling strategy")).unwrap();
        store.add(item("b", "frontend rendering pipeline")).unwrap();
        assert_eq!(store.count(), 2);

        // Re-opening sees the persisted items
        let reopened = LocalStore::open(&paths);
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.get_all().len(), 2);
        assert_eq!(reopened.status(), BackendStatus::Ready);
    }

    #[test]
    fn test_add_replaces_same_id() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let mut store = LocalStore::open(&paths);
        store.add(item("a", "first version")).unwrap();
        store.add(item("a", "second version")).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.get_all()[0].text, "second version");
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());

        let mut store = LocalStore::open(&paths);
        store.add(item("a", "database connection pooling strategy")).unwrap();
        store.add(item("b", "database schema migration tooling")).unwrap();
        store.add(item("c", "completely unrelated topic")).unwrap();

        let hits = store.search("database connection pooling", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item.id, "a");
        assert!(hits[0].score > hits[1].score);

        let limited = store.search("database", 1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_factory_defaults_to_local() {
        // The hints are unset in the test environment.
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let backend = select_backend(&paths);
        assert_eq!(backend.name(), "local");
    }
}
