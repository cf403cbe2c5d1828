//! Source collector
//!
//! Turns the memory tree into typed `(date, text)` entry streams. All
//! parsers are forgiving: missing files yield empty streams and malformed
//! lines are skipped — the worst case is a shorter stream, never an error.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::memory::ProjectPaths;
use crate::stigmergy;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{4}-\d{2}-\d{2})").expect("valid regex"));

static TRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2})[^\]]*\]\s*\[(\w[\w-]*)\]\s*\[([^\]]+)\]\s*(.*)$")
        .expect("valid regex")
});

/// Trace levels the collector keeps; the rest is operational noise.
const SIGNIFICANT_TRACE_LEVELS: &[&str] = &["DECISION", "CHECKPOINT", "FAILURE", "REMEMBER"];

// ============================================================================
// TYPES
// ============================================================================

/// Kind of memory source. Spellings appear in reports and dream journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Learnings,
    Decisions,
    Trace,
    FailureMuseum,
    SharedContext,
    Contradictions,
    Stigmergy,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Learnings => "learnings",
            SourceKind::Decisions => "decisions",
            SourceKind::Trace => "trace",
            SourceKind::FailureMuseum => "failure-museum",
            SourceKind::SharedContext => "shared-context",
            SourceKind::Contradictions => "contradictions",
            SourceKind::Stigmergy => "stigmergy",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dated entry. `date` is `YYYY-MM-DD` or empty for undated entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub date: String,
    pub text: String,
}

impl SourceEntry {
    pub fn new(date: impl Into<String>, text: impl Into<String>) -> Self {
        Self { date: date.into(), text: text.into() }
    }
}

/// Named parsed view over one memory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySource {
    /// Logical name, e.g. `learnings/dev.md` or `BMAD_TRACE.md`.
    pub name: String,
    pub kind: SourceKind,
    pub entries: Vec<SourceEntry>,
}

impl MemorySource {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.text.as_str())
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.date.as_str())
    }
}

// ============================================================================
// PARSERS
// ============================================================================

/// Extract the first `[YYYY-MM-DD` date found in a line, or empty.
pub fn extract_date(line: &str) -> String {
    DATE_RE
        .captures(line)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

fn passes_since(date: &str, since: Option<&str>) -> bool {
    match since {
        // Undated entries always pass; lexicographic compare works for ISO dates.
        Some(cutoff) => date.is_empty() || date >= cutoff,
        None => true,
    }
}

/// Parse a markdown memory file into bullet entries with optional dates.
pub fn parse_markdown_entries(path: &Path, since: Option<&str>) -> Vec<SourceEntry> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            let date = extract_date(line);
            if !passes_since(&date, since) {
                continue;
            }
            entries.push(SourceEntry::new(date, rest.trim()));
        }
    }
    entries
}

/// Parse BMAD_TRACE.md event lines, keeping significant levels only.
/// Entries are rendered `[agent] [LEVEL] payload`.
pub fn parse_trace_entries(
    path: &Path,
    since: Option<&str>,
    agent_filter: Option<&str>,
) -> Vec<SourceEntry> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for line in content.lines() {
        let Some(caps) = TRACE_RE.captures(line.trim()) else {
            continue;
        };
        let (date, level, agent, payload) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        if !passes_since(date, since) {
            continue;
        }
        if let Some(filter) = agent_filter
            && !agent.to_lowercase().contains(&filter.to_lowercase())
        {
            continue;
        }
        if SIGNIFICANT_TRACE_LEVELS.contains(&level) {
            entries.push(SourceEntry::new(date, format!("[{}] [{}] {}", agent, level, payload)));
        }
    }
    entries
}

/// Split shared-context prose into its non-empty `## ` sections.
pub fn parse_shared_context_sections(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.starts_with("## ") {
            if !current.trim().is_empty() {
                sections.push(current.trim().to_string());
            }
            current = format!("{}\n", line);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

/// Read the pheromone board as a memory source: active pheromones only.
/// Signals emitted by `dream-mode` are skipped unless they were reinforced
/// (that breaks the dream → board → dream self-loop; a reinforcement is a
/// feedback signal from a real agent).
pub fn parse_pheromone_entries(paths: &ProjectPaths, since: Option<&str>) -> Vec<SourceEntry> {
    let board = stigmergy::load_board(paths);
    let mut entries = Vec::new();

    for p in &board.pheromones {
        if p.resolved {
            continue;
        }
        if p.emitter == "dream-mode" && p.reinforcements == 0 {
            continue;
        }
        let date = if p.timestamp.len() >= 10 { p.timestamp[..10].to_string() } else { String::new() };
        if !passes_since(&date, since) {
            continue;
        }

        let mut label = format!("[{}] @{} by {}", p.pheromone_type, p.location, p.emitter);
        if p.reinforcements > 0 {
            label.push_str(&format!(" (+{} reinforcements)", p.reinforcements));
        }
        entries.push(SourceEntry::new(date, format!("{}: {}", label, p.text)));
    }

    entries
}

// ============================================================================
// COLLECTION
// ============================================================================

/// Collect every known memory source for a project. Sources with no
/// surviving entries are omitted.
pub fn collect_sources(
    paths: &ProjectPaths,
    since: Option<&str>,
    agent_filter: Option<&str>,
) -> Vec<MemorySource> {
    let mut sources: Vec<MemorySource> = Vec::new();

    // 1. Agent learnings, one source per file
    if let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) {
        let mut files: Vec<_> = read_dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "md"))
            .collect();
        files.sort();
        for file in files {
            let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            if let Some(filter) = agent_filter
                && !stem.to_lowercase().contains(&filter.to_lowercase())
            {
                continue;
            }
            let entries = parse_markdown_entries(&file, since);
            if !entries.is_empty() {
                let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                sources.push(MemorySource {
                    name: format!("learnings/{}", file_name),
                    kind: SourceKind::Learnings,
                    entries,
                });
            }
        }
    }

    // 2. Decisions log
    let entries = parse_markdown_entries(&paths.decisions_log(), since);
    if !entries.is_empty() {
        sources.push(MemorySource {
            name: "decisions-log.md".to_string(),
            kind: SourceKind::Decisions,
            entries,
        });
    }

    // 3. Trace
    let entries = parse_trace_entries(&paths.trace(), since, agent_filter);
    if !entries.is_empty() {
        sources.push(MemorySource {
            name: "BMAD_TRACE.md".to_string(),
            kind: SourceKind::Trace,
            entries,
        });
    }

    // 4. Failure museum
    let entries = parse_markdown_entries(&paths.failure_museum(), since);
    if !entries.is_empty() {
        sources.push(MemorySource {
            name: "failure-museum.md".to_string(),
            kind: SourceKind::FailureMuseum,
            entries,
        });
    }

    // 5. Shared context (sections, undated)
    if let Ok(content) = fs::read_to_string(paths.shared_context()) {
        let sections = parse_shared_context_sections(&content);
        if !sections.is_empty() {
            sources.push(MemorySource {
                name: "shared-context.md".to_string(),
                kind: SourceKind::SharedContext,
                entries: sections.into_iter().map(|s| SourceEntry::new("", s)).collect(),
            });
        }
    }

    // 6. Contradiction log
    let entries = parse_markdown_entries(&paths.contradiction_log(), since);
    if !entries.is_empty() {
        sources.push(MemorySource {
            name: "contradiction-log.md".to_string(),
            kind: SourceKind::Contradictions,
            entries,
        });
    }

    // 7. Pheromone board (feedback loop: the dream reads stigmergy signals)
    let entries = parse_pheromone_entries(paths, since);
    if !entries.is_empty() {
        sources.push(MemorySource {
            name: "pheromone-board.json".to_string(),
            kind: SourceKind::Stigmergy,
            entries,
        });
    }

    sources
}

// ============================================================================
// TESTS
// ============================================================================
