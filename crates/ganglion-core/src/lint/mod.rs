//! Memory linter
//!
//! Cross-file consistency checks over the memory tree:
//! - contradictions between files (opposite polarity, similar topic)
//! - duplicated entries copied across files
//! - orphan decisions (traced but missing from the decisions log)
//! - failures without a captured lesson
//! - inconsistent chronological ordering inside a file
//!
//! Errors can optionally be published on the pheromone board so agents
//! sense them without reading the report.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::memory::sources::extract_date;
use crate::memory::{ProjectPaths, Result};
use crate::similarity::{truncate_chars, unigram_similarity};
use crate::stigmergy::{self, PheromoneType};

pub const LINT_VERSION: &str = "1.0.0";

/// Similarity at or above which two cross-file entries are duplicates.
pub const DUPLICATE_THRESHOLD: f64 = 0.75;
/// Similarity at or above which opposite-polarity entries contradict.
pub const CONTRADICTION_THRESHOLD: f64 = 0.30;

/// Prescriptive polarity markers (shared logic with the dream tensions).
const POSITIVE_MARKERS: &[&str] = &[
    "toujours", "always", "must", "doit", "jamais", "never",
    "obligatoire", "required", "important", "critical",
];

const NEGATIVE_MARKERS: &[&str] = &[
    "éviter", "avoid", "ne pas", "danger",
    "risque", "problème", "échec", "fail", "broken", "cassé",
];

// ============================================================================
// TYPES
// ============================================================================

/// Issue severity, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
    Info,
}

impl LintSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LintSeverity::Error => "error",
            LintSeverity::Warning => "warning",
            LintSeverity::Info => "info",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            LintSeverity::Error => "🔴",
            LintSeverity::Warning => "🟡",
            LintSeverity::Info => "🔵",
        }
    }
}

/// Issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LintCategory {
    Contradiction,
    Duplicate,
    Orphan,
    BrokenRef,
    Chrono,
}

impl LintCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LintCategory::Contradiction => "contradiction",
            LintCategory::Duplicate => "duplicate",
            LintCategory::Orphan => "orphan",
            LintCategory::BrokenRef => "broken-ref",
            LintCategory::Chrono => "chrono",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            LintCategory::Contradiction => "⚡",
            LintCategory::Duplicate => "📋",
            LintCategory::Orphan => "👻",
            LintCategory::BrokenRef => "🔗",
            LintCategory::Chrono => "📅",
        }
    }
}

/// One detected problem.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub issue_id: String,
    pub severity: LintSeverity,
    pub category: LintCategory,
    pub title: String,
    pub description: String,
    pub files: Vec<String>,
    pub entries: Vec<String>,
    pub fix_suggestion: String,
}

/// A parsed memory file, lint view.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub path: String,
    pub kind: FileKind,
    pub entries: Vec<(String, String)>, // (date, text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Learnings,
    Decisions,
    Trace,
    FailureMuseum,
    SharedContext,
    Contradictions,
}

/// Full lint report.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub files_scanned: usize,
    pub entries_scanned: usize,
    pub issues: Vec<LintIssue>,
}

impl LintReport {
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == LintSeverity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == LintSeverity::Warning).count()
    }

    pub fn info_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == LintSeverity::Info).count()
    }
}

/// Sequential `ML-NNN` issue ids within one lint run.
#[derive(Debug, Default)]
struct IssueIds(u32);

impl IssueIds {
    fn next(&mut self) -> String {
        self.0 += 1;
        format!("ML-{:03}", self.0)
    }
}

// ============================================================================
// COLLECTION
// ============================================================================

fn parse_markdown(path: &Path) -> Vec<(String, String)> {
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
            entries.push((extract_date(line), rest.trim().to_string()));
        }
    }
    entries
}

fn parse_trace(path: &Path) -> Vec<(String, String)> {
    crate::memory::sources::parse_trace_entries(path, None, None)
        .into_iter()
        .map(|e| (e.date, e.text))
        .collect()
}

/// Collect every memory file with at least one entry.
pub fn collect_memory_files(paths: &ProjectPaths) -> Vec<MemoryFile> {
    let mut files = Vec::new();

    if let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) {
        let mut learning_files: Vec<_> = read_dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "md"))
            .collect();
        learning_files.sort();
        for file in learning_files {
            let entries = parse_markdown(&file);
            if !entries.is_empty() {
                let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                files.push(MemoryFile {
                    path: format!("learnings/{}", name),
                    kind: FileKind::Learnings,
                    entries,
                });
            }
        }
    }

    for (path, logical, kind) in [
        (paths.decisions_log(), "decisions-log.md", FileKind::Decisions),
        (paths.failure_museum(), "failure-museum.md", FileKind::FailureMuseum),
        (paths.contradiction_log(), "contradiction-log.md", FileKind::Contradictions),
        (paths.shared_context(), "shared-context.md", FileKind::SharedContext),
    ] {
        let entries = parse_markdown(&path);
        if !entries.is_empty() {
            files.push(MemoryFile { path: logical.to_string(), kind, entries });
        }
    }

    let trace_entries = parse_trace(&paths.trace());
    if !trace_entries.is_empty() {
        files.push(MemoryFile {
            path: "BMAD_TRACE.md".to_string(),
            kind: FileKind::Trace,
            entries: trace_entries,
        });
    }

    files
}

// ============================================================================
// CHECKS
// ============================================================================

fn polarity(text: &str) -> (bool, bool) {
    let lower = text.to_lowercase();
    let positive = POSITIVE_MARKERS.iter().any(|m| lower.contains(m));
    let negative = NEGATIVE_MARKERS.iter().any(|m| lower.contains(m));
    (positive, negative)
}

/// Opposite-polarity entries from different files on a similar topic.
fn check_contradictions(files: &[MemoryFile], ids: &mut IssueIds) -> Vec<LintIssue> {
    let mut positive: Vec<(&str, &str)> = Vec::new();
    let mut negative: Vec<(&str, &str)> = Vec::new();

    for file in files {
        for (_, text) in &file.entries {
            let (is_positive, is_negative) = polarity(text);
            if is_positive {
                positive.push((&file.path, text));
            }
            if is_negative {
                negative.push((&file.path, text));
            }
        }
    }

    let mut issues = Vec::new();
    for (pos_file, pos_text) in &positive {
        for (neg_file, neg_text) in &negative {
            if pos_file == neg_file {
                continue;
            }
            let sim = unigram_similarity(pos_text, neg_text);
            if sim >= CONTRADICTION_THRESHOLD {
                issues.push(LintIssue {
                    issue_id: ids.next(),
                    severity: LintSeverity::Error,
                    category: LintCategory::Contradiction,
                    title: format!("Contradiction between {} and {}", pos_file, neg_file),
                    description: format!(
                        "Positive/negative polarity on a similar topic (similarity: {:.0}%)",
                        sim * 100.0
                    ),
                    files: vec![pos_file.to_string(), neg_file.to_string()],
                    entries: vec![truncate_chars(pos_text, 120), truncate_chars(neg_text, 120)],
                    fix_suggestion: "Check whether both entries are compatible. If so, clarify the \
                                     context. If not, resolve and record it in contradiction-log.md."
                        .to_string(),
                });
            }
        }
    }
    issues
}

/// Near-identical entries copied across files.
fn check_duplicates(files: &[MemoryFile], ids: &mut IssueIds) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let mut seen: Vec<(&str, &str)> = Vec::new();

    for file in files {
        for (_, text) in &file.entries {
            for (prev_file, prev_text) in &seen {
                if *prev_file == file.path {
                    continue;
                }
                if unigram_similarity(text, prev_text) >= DUPLICATE_THRESHOLD {
                    issues.push(LintIssue {
                        issue_id: ids.next(),
                        severity: LintSeverity::Warning,
                        category: LintCategory::Duplicate,
                        title: format!("Duplicate between {} and {}", file.path, prev_file),
                        description: "Very similar entries in two memory files".to_string(),
                        files: vec![file.path.clone(), prev_file.to_string()],
                        entries: vec![truncate_chars(text, 120), truncate_chars(prev_text, 120)],
                        fix_suggestion: "Keep the entry in the most appropriate file and drop the \
                                         copy from the other."
                            .to_string(),
                    });
                }
            }
            seen.push((&file.path, text));
        }
    }
    issues
}

/// Trace `[DECISION]` events with no counterpart in the decisions log.
fn check_orphan_decisions(files: &[MemoryFile], ids: &mut IssueIds) -> Vec<LintIssue> {
    let Some(trace) = files.iter().find(|f| f.kind == FileKind::Trace) else {
        return Vec::new();
    };
    let Some(decisions) = files.iter().find(|f| f.kind == FileKind::Decisions) else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for (date, trace_text) in &trace.entries {
        if !trace_text.contains("[DECISION]") {
            continue;
        }
        let matched = decisions
            .entries
            .iter()
            .any(|(_, decision_text)| unigram_similarity(trace_text, decision_text) >= 0.3);
        if !matched {
            issues.push(LintIssue {
                issue_id: ids.next(),
                severity: LintSeverity::Warning,
                category: LintCategory::Orphan,
                title: format!("Orphan decision in BMAD_TRACE [{}]", date),
                description: "A decision recorded in the trace has no matching entry in \
                              decisions-log.md"
                    .to_string(),
                files: vec!["BMAD_TRACE.md".to_string(), "decisions-log.md".to_string()],
                entries: vec![truncate_chars(trace_text, 150)],
                fix_suggestion: "Add this decision to decisions-log.md for full traceability."
                    .to_string(),
            });
        }
    }
    issues
}

/// Failure museum entries with no corresponding lesson in any learnings.
fn check_failures_without_lesson(files: &[MemoryFile], ids: &mut IssueIds) -> Vec<LintIssue> {
    let Some(failures) = files.iter().find(|f| f.kind == FileKind::FailureMuseum) else {
        return Vec::new();
    };
    let learning_texts: Vec<&str> = files
        .iter()
        .filter(|f| f.kind == FileKind::Learnings)
        .flat_map(|f| f.entries.iter().map(|(_, t)| t.as_str()))
        .collect();
    if learning_texts.is_empty() {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for (date, failure_text) in &failures.entries {
        let matched = learning_texts
            .iter()
            .any(|lesson| unigram_similarity(failure_text, lesson) >= 0.25);
        if !matched {
            issues.push(LintIssue {
                issue_id: ids.next(),
                severity: LintSeverity::Info,
                category: LintCategory::Orphan,
                title: format!("Uncapitalized failure [{}]", date),
                description: "A failure in the museum has no corresponding lesson in the \
                              learnings."
                    .to_string(),
                files: vec!["failure-museum.md".to_string()],
                entries: vec![truncate_chars(failure_text, 150)],
                fix_suggestion: "Extract the lesson from this failure and add it to the relevant \
                                 agent's learnings file."
                    .to_string(),
            });
        }
    }
    issues
}

/// Dated entries should follow one consistent direction per file.
fn check_chronology(files: &[MemoryFile], ids: &mut IssueIds) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    for file in files {
        let dates: Vec<&str> = file
            .entries
            .iter()
            .map(|(d, _)| d.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        if dates.len() < 3 {
            continue;
        }

        let transitions = dates.len() - 1;
        let ascending = dates.windows(2).filter(|w| w[1] >= w[0]).count();
        let descending = dates.windows(2).filter(|w| w[1] <= w[0]).count();
        let dominant = ascending.max(descending);

        if (dominant as f64 / transitions as f64) < 0.7 {
            issues.push(LintIssue {
                issue_id: ids.next(),
                severity: LintSeverity::Info,
                category: LintCategory::Chrono,
                title: format!("Out-of-order dates in {}", file.path),
                description: format!(
                    "{} dated entries follow no consistent chronological direction (asc: {}, desc: {})",
                    dates.len(),
                    ascending,
                    descending
                ),
                files: vec![file.path.clone()],
                entries: Vec::new(),
                fix_suggestion: "Reorder the entries by date.".to_string(),
            });
        }
    }
    issues
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Run every consistency check. Issues are ordered errors → warnings →
/// info, ids sequential in detection order.
pub fn lint_memory(paths: &ProjectPaths) -> LintReport {
    let files = collect_memory_files(paths);
    let mut ids = IssueIds::default();

    let mut report = LintReport {
        files_scanned: files.len(),
        entries_scanned: files.iter().map(|f| f.entries.len()).sum(),
        issues: Vec::new(),
    };

    report.issues.extend(check_contradictions(&files, &mut ids));
    report.issues.extend(check_duplicates(&files, &mut ids));
    report.issues.extend(check_orphan_decisions(&files, &mut ids));
    report.issues.extend(check_failures_without_lesson(&files, &mut ids));
    report.issues.extend(check_chronology(&files, &mut ids));

    report.issues.sort_by_key(|i| i.severity);
    report
}

/// Publish each ERROR as an ALERT pheromone, deduplicated against active
/// board texts. Returns the number emitted.
pub fn emit_to_stigmergy(report: &LintReport, paths: &ProjectPaths) -> Result<usize> {
    let mut board = stigmergy::load_board(paths);
    let mut seen = stigmergy::active_texts(&board);
    let mut emitted = 0;

    for issue in &report.issues {
        if issue.severity != LintSeverity::Error {
            continue;
        }
        let text = format!("[memory-lint] {}: {}", issue.title, truncate_chars(&issue.description, 200));
        let location = issue.files.first().cloned().unwrap_or_else(|| "memory".to_string());
        if stigmergy::emit_unique(
            &mut board,
            PheromoneType::Alert,
            &location,
            &text,
            "memory-lint",
            vec!["auto-lint".to_string(), issue.category.as_str().to_string()],
            0.8,
            &mut seen,
        ) {
            emitted += 1;
        }
    }

    if emitted > 0 {
        stigmergy::save_board(paths, &board)?;
    }
    Ok(emitted)
}

// ============================================================================
// RENDERING
// ============================================================================

/// Human report.
pub fn render_report(report: &LintReport, show_fix: bool) -> String {
    let mut lines = vec![
        "🔍 Memory Lint Report".to_string(),
        format!("   Files scanned: {}", report.files_scanned),
        format!("   Entries analyzed: {}", report.entries_scanned),
        String::new(),
    ];

    if report.issues.is_empty() {
        lines.push("✅ No problem detected — memory is consistent.".to_string());
        return lines.join("\n");
    }

    lines.push(format!(
        "   Problems: {} errors, {} warnings, {} infos",
        report.error_count(),
        report.warning_count(),
        report.info_count()
    ));
    lines.extend([String::new(), "---".to_string(), String::new()]);

    for issue in &report.issues {
        lines.push(format!(
            "{} {} [{}] {}",
            issue.severity.icon(),
            issue.category.icon(),
            issue.issue_id,
            issue.title
        ));
        lines.push(format!("   {}", issue.description));
        for entry in issue.entries.iter().take(2) {
            lines.push(format!("     → {}", entry));
        }
        if show_fix && !issue.fix_suggestion.is_empty() {
            lines.push(format!("   💡 Fix: {}", issue.fix_suggestion));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Machine-readable report.
pub fn report_to_json(report: &LintReport) -> serde_json::Value {
    json!({
        "version": LINT_VERSION,
        "files_scanned": report.files_scanned,
        "entries_scanned": report.entries_scanned,
        "summary": {
            "errors": report.error_count(),
            "warnings": report.warning_count(),
            "info": report.info_count(),
            "total": report.issues.len(),
        },
        "issues": report.issues,
    })
}

// ============================================================================
// TESTS
// ============================================================================
