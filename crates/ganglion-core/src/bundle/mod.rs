//! Bundle codec — cross-project migration
//!
//! A mature project can pollinate a new one with its accumulated
//! artifacts: agent learnings, rules distilled from the failure museum,
//! DNA patches, forged-agent proposals, consensus and anti-fragility
//! histories. Everything travels in one portable JSON bundle guarded by
//! a magic string; a bundle without the magic is rejected on load.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{CoreError, ProjectContext, ProjectPaths, Result, write_json_atomic};

pub const BUNDLE_VERSION: &str = "1.0.0";
pub const BUNDLE_MAGIC: &str = "bmad-bundle";

/// Exportable artifact kinds, in manifest order.
pub const ARTIFACT_TYPES: &[&str] =
    &["learnings", "rules", "dna_patches", "agents", "consensus", "antifragile"];

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*]\s*(?:Règle instaurée|Rule)\s*:\s*(.+)").expect("valid regex"));
static LESSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-*]\s*(?:Leçon|Lesson)\s*:\s*(.+)").expect("valid regex"));
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[?(\d{4}-\d{2}-\d{2})\]?").expect("valid regex"));
static LEADING_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[?\d{4}-\d{2}-\d{2}\]?\s*").expect("valid regex"));
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(CC-FAIL|WRONG-ASSUMPTION|CONTEXT-LOSS|HALLUCINATION|ARCH-MISTAKE|PROCESS-SKIP)")
        .expect("valid regex")
});

// ============================================================================
// TYPES
// ============================================================================

/// Bundle manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleManifest {
    pub version: String,
    pub magic: String,
    pub source_project: String,
    pub export_date: String,
    pub artifact_types: Vec<String>,
    pub total_items: usize,
    #[serde(default)]
    pub since: String,
}

impl Default for BundleManifest {
    fn default() -> Self {
        Self {
            version: BUNDLE_VERSION.to_string(),
            magic: BUNDLE_MAGIC.to_string(),
            source_project: String::new(),
            export_date: String::new(),
            artifact_types: Vec::new(),
            total_items: 0,
            since: String::new(),
        }
    }
}

/// One exported learning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedLearning {
    pub agent: String,
    pub text: String,
    #[serde(default)]
    pub date: String,
}

/// One rule recovered from the failure museum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedRule {
    pub category: String,
    pub rule: String,
    #[serde(default)]
    pub lesson: String,
    #[serde(default)]
    pub date: String,
}

/// A proposal file carried verbatim (DNA patch or forged agent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedFile {
    pub filename: String,
    pub content: String,
}

/// The full migration bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrationBundle {
    pub manifest: BundleManifest,
    #[serde(default)]
    pub learnings: Vec<ExportedLearning>,
    #[serde(default)]
    pub rules: Vec<ExportedRule>,
    #[serde(default)]
    pub dna_patches: Vec<ExportedFile>,
    #[serde(default)]
    pub agents: Vec<ExportedFile>,
    #[serde(default)]
    pub consensus: Vec<Value>,
    #[serde(default)]
    pub antifragile: Vec<Value>,
}

// ============================================================================
// EXPORT
// ============================================================================

fn extract_line_date(line: &str) -> String {
    DATE_RE.captures(line).map(|c| c[1].to_string()).unwrap_or_default()
}

/// Export every agent's learnings.
pub fn export_learnings(paths: &ProjectPaths, since: Option<&str>) -> Vec<ExportedLearning> {
    let mut results = Vec::new();
    let Ok(read_dir) = fs::read_dir(paths.learnings_dir()) else {
        return results;
    };
    let mut files: Vec<_> = read_dir
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "md"))
        .collect();
    files.sort();

    for file in files {
        let agent = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) else {
                continue;
            };
            let date = extract_line_date(line);
            if let Some(cutoff) = since
                && !date.is_empty()
                && date.as_str() < cutoff
            {
                continue;
            }
            let text = LEADING_DATE_RE.replace(rest.trim(), "").trim().to_string();
            if !text.is_empty() {
                results.push(ExportedLearning { agent: agent.clone(), text, date });
            }
        }
    }
    results
}

/// Export standing rules from the failure museum: `### [date] CATEGORY — …`
/// sections with `Règle instaurée:` / `Leçon:` lines.
pub fn export_rules(paths: &ProjectPaths, since: Option<&str>) -> Vec<ExportedRule> {
    let Ok(content) = fs::read_to_string(paths.failure_museum()) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    let mut current = ExportedRule {
        category: String::new(),
        rule: String::new(),
        lesson: String::new(),
        date: String::new(),
    };
    let mut in_entry = false;

    let flush = |in_entry: bool, current: &ExportedRule, results: &mut Vec<ExportedRule>| {
        if in_entry && !current.rule.is_empty() {
            results.push(current.clone());
        }
    };

    for line in content.lines() {
        if line.starts_with("### [") {
            flush(in_entry, &current, &mut results);

            let date = extract_line_date(line);
            if let Some(cutoff) = since
                && !date.is_empty()
                && date.as_str() < cutoff
            {
                in_entry = false;
                continue;
            }

            in_entry = true;
            current = ExportedRule {
                category: CATEGORY_RE
                    .captures(line)
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                rule: String::new(),
                lesson: String::new(),
                date,
            };
        }

        if in_entry {
            let trimmed = line.trim();
            if let Some(caps) = RULE_RE.captures(trimmed) {
                current.rule = caps[1].trim().to_string();
            }
            if let Some(caps) = LESSON_RE.captures(trimmed) {
                current.lesson = caps[1].trim().to_string();
            }
        }
    }
    flush(in_entry, &current, &mut results);

    results
}

fn export_dir_files(dir: &Path, extension_filter: impl Fn(&Path) -> bool) -> Vec<ExportedFile> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = read_dir.flatten().map(|e| e.path()).filter(|p| extension_filter(p)).collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            Some(ExportedFile {
                filename: path.file_name().map(|n| n.to_string_lossy().into_owned())?,
                content,
            })
        })
        .collect()
}

fn export_json_array(path: &Path) -> Vec<Value> {
    crate::memory::read_json::<Value>(path)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

/// Build a bundle from the project. `only` restricts artifact kinds.
pub fn create_bundle(
    paths: &ProjectPaths,
    only: Option<&HashSet<String>>,
    since: Option<&str>,
) -> MigrationBundle {
    let wants = |kind: &str| only.is_none_or(|set| set.contains(kind));

    let context = ProjectContext::load(paths);
    let mut bundle = MigrationBundle {
        manifest: BundleManifest {
            source_project: context.project_name(paths),
            export_date: Utc::now().to_rfc3339(),
            since: since.unwrap_or_default().to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut total = 0;
    if wants("learnings") {
        bundle.learnings = export_learnings(paths, since);
        total += bundle.learnings.len();
        if !bundle.learnings.is_empty() {
            bundle.manifest.artifact_types.push("learnings".to_string());
        }
    }
    if wants("rules") {
        bundle.rules = export_rules(paths, since);
        total += bundle.rules.len();
        if !bundle.rules.is_empty() {
            bundle.manifest.artifact_types.push("rules".to_string());
        }
    }
    if wants("dna_patches") {
        bundle.dna_patches =
            export_dir_files(&paths.dna_proposals(), |p| p.extension().is_some_and(|e| e == "yaml"));
        total += bundle.dna_patches.len();
        if !bundle.dna_patches.is_empty() {
            bundle.manifest.artifact_types.push("dna_patches".to_string());
        }
    }
    if wants("agents") {
        bundle.agents = export_dir_files(&paths.forge_proposals(), |p| {
            p.to_string_lossy().ends_with(".proposed.md")
        });
        total += bundle.agents.len();
        if !bundle.agents.is_empty() {
            bundle.manifest.artifact_types.push("agents".to_string());
        }
    }
    if wants("consensus") {
        bundle.consensus = export_json_array(&paths.consensus_history());
        total += bundle.consensus.len();
        if !bundle.consensus.is_empty() {
            bundle.manifest.artifact_types.push("consensus".to_string());
        }
    }
    if wants("antifragile") {
        bundle.antifragile = export_json_array(&paths.antifragile_history());
        total += bundle.antifragile.len();
        if !bundle.antifragile.is_empty() {
            bundle.manifest.artifact_types.push("antifragile".to_string());
        }
    }

    bundle.manifest.total_items = total;
    bundle
}

/// Persist a bundle.
pub fn save_bundle(bundle: &MigrationBundle, output: &Path) -> Result<()> {
    write_json_atomic(output, bundle)
}

/// Load a bundle, rejecting anything without the exact magic string.
pub fn load_bundle(path: &Path) -> Result<MigrationBundle> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| CoreError::InvalidBundle(format!("unreadable JSON: {}", e)))?;

    if value.get("manifest").and_then(|m| m.get("magic")).and_then(|m| m.as_str()) != Some(BUNDLE_MAGIC) {
        return Err(CoreError::InvalidBundle(
            "missing or wrong magic string".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| CoreError::InvalidBundle(e.to_string()))
}

// ============================================================================
// IMPORT
// ============================================================================

/// Counters for one import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub learnings_imported: usize,
    pub rules_imported: usize,
    pub dna_patches_imported: usize,
    pub agents_imported: usize,
    pub consensus_imported: usize,
    pub antifragile_imported: usize,
    pub skipped: usize,
    pub conflicts: Vec<String>,
}

impl ImportResult {
    pub fn total(&self) -> usize {
        self.learnings_imported
            + self.rules_imported
            + self.dna_patches_imported
            + self.agents_imported
            + self.consensus_imported
            + self.antifragile_imported
    }
}

fn render_learning_line(item: &ExportedLearning) -> String {
    if item.date.is_empty() {
        format!("- [migré] {}", item.text)
    } else {
        format!("- [{}] [migré] {}", item.date, item.text)
    }
}

fn render_rule_line(rule: &ExportedRule) -> String {
    let mut line = format!("- [{}] [{}] Règle: {}", rule.date, rule.category, rule.rule);
    if !rule.lesson.is_empty() {
        line.push_str(&format!(" | Leçon: {}", rule.lesson));
    }
    line
}

fn merge_json_history(
    path: &Path,
    incoming: &[Value],
    dry_run: bool,
) -> Result<(usize, usize)> {
    let existing = export_json_array(path);
    let existing_timestamps: HashSet<&str> = existing
        .iter()
        .filter_map(|e| e.get("timestamp").and_then(|t| t.as_str()))
        .collect();

    let new_entries: Vec<&Value> = incoming
        .iter()
        .filter(|e| {
            e.get("timestamp")
                .and_then(|t| t.as_str())
                .is_none_or(|ts| !existing_timestamps.contains(ts))
        })
        .collect();

    let imported = new_entries.len();
    let skipped = incoming.len() - imported;
    if imported > 0 && !dry_run {
        let mut merged = existing;
        merged.extend(new_entries.into_iter().cloned());
        write_json_atomic(path, &merged)?;
    }
    Ok((imported, skipped))
}

/// Import a bundle into a project. Learnings append (dedup on rendered
/// line, case-insensitive); rules collect into `migrated-rules.md`;
/// proposal files never overwrite (conflicts recorded); histories merge
/// by timestamp. `dry_run` counts without touching disk.
pub fn import_bundle(
    bundle: &MigrationBundle,
    paths: &ProjectPaths,
    dry_run: bool,
) -> Result<ImportResult> {
    let mut result = ImportResult::default();

    // Learnings, grouped by agent
    if !bundle.learnings.is_empty() {
        let learnings_dir = paths.learnings_dir();
        if !dry_run {
            fs::create_dir_all(&learnings_dir)?;
        }

        let mut by_agent: Vec<(&str, Vec<&ExportedLearning>)> = Vec::new();
        for item in &bundle.learnings {
            match by_agent.iter_mut().find(|(agent, _)| *agent == item.agent) {
                Some((_, items)) => items.push(item),
                None => by_agent.push((&item.agent, vec![item])),
            }
        }

        for (agent, items) in by_agent {
            let target = learnings_dir.join(format!("{}.md", agent));
            let existing = fs::read_to_string(&target).unwrap_or_default().to_lowercase();

            let mut new_lines = Vec::new();
            for item in items {
                let line = render_learning_line(item);
                if existing.contains(&line.to_lowercase()) {
                    result.skipped += 1;
                } else {
                    new_lines.push(line);
                }
            }

            result.learnings_imported += new_lines.len();
            if !new_lines.is_empty() && !dry_run {
                let mut file = fs::OpenOptions::new().create(true).append(true).open(&target)?;
                use std::io::Write;
                writeln!(file, "\n{}", new_lines.join("\n"))?;
            }
        }
    }

    // Rules
    if !bundle.rules.is_empty() {
        let rules_path = paths.migrated_rules();
        let existing = fs::read_to_string(&rules_path).unwrap_or_default().to_lowercase();

        let mut new_lines = Vec::new();
        for rule in &bundle.rules {
            let line = render_rule_line(rule);
            if existing.contains(&line.to_lowercase()) {
                result.skipped += 1;
            } else {
                new_lines.push(line);
            }
        }

        result.rules_imported += new_lines.len();
        if !new_lines.is_empty() && !dry_run {
            if rules_path.exists() {
                let mut file = fs::OpenOptions::new().append(true).open(&rules_path)?;
                use std::io::Write;
                writeln!(file, "\n{}", new_lines.join("\n"))?;
            } else {
                let header = format!(
                    "# Rules migrated from other projects\n\n> Source: {}\n> Imported: {}\n\n",
                    bundle.manifest.source_project,
                    Utc::now().format("%Y-%m-%d")
                );
                fs::create_dir_all(paths.memory_dir())?;
                fs::write(&rules_path, format!("{}{}\n", header, new_lines.join("\n")))?;
            }
        }
    }

    // DNA patches and forged agents: plain files, never overwritten
    result.dna_patches_imported = import_proposal_files(
        &bundle.dna_patches,
        &paths.dna_proposals().join("migrated"),
        "DNA patch",
        dry_run,
        &mut result.conflicts,
        &mut result.skipped,
    )?;
    result.agents_imported = import_proposal_files(
        &bundle.agents,
        &paths.forge_proposals().join("migrated"),
        "Agent",
        dry_run,
        &mut result.conflicts,
        &mut result.skipped,
    )?;

    // Histories merge by timestamp
    if !bundle.consensus.is_empty() {
        let (imported, skipped) = merge_json_history(&paths.consensus_history(), &bundle.consensus, dry_run)?;
        result.consensus_imported += imported;
        result.skipped += skipped;
    }
    if !bundle.antifragile.is_empty() {
        let (imported, skipped) =
            merge_json_history(&paths.antifragile_history(), &bundle.antifragile, dry_run)?;
        result.antifragile_imported += imported;
        result.skipped += skipped;
    }

    Ok(result)
}

fn import_proposal_files(
    items: &[ExportedFile],
    target_dir: &Path,
    label: &str,
    dry_run: bool,
    conflicts: &mut Vec<String>,
    skipped: &mut usize,
) -> Result<usize> {
    if items.is_empty() {
        return Ok(0);
    }
    if !dry_run {
        fs::create_dir_all(target_dir)?;
    }

    let mut imported = 0;
    for item in items {
        let target = target_dir.join(&item.filename);
        if target.exists() {
            conflicts.push(format!("{} {} already exists", label, item.filename));
            *skipped += 1;
        } else {
            if !dry_run {
                fs::write(&target, &item.content)?;
            }
            imported += 1;
        }
    }
    Ok(imported)
}

// ============================================================================
// RENDERING
// ============================================================================

/// Markdown summary of a bundle's contents.
pub fn render_inspect(bundle: &MigrationBundle) -> String {
    let m = &bundle.manifest;
    let mut lines = vec![
        "# 📦 Migration Bundle".to_string(),
        String::new(),
        format!("> **Source**: {}", m.source_project),
        format!("> **Export date**: {}", &m.export_date[..10.min(m.export_date.len())]),
        format!("> **Version**: {}", m.version),
        format!("> **Artifacts**: {}", m.artifact_types.join(", ")),
        format!("> **Total items**: {}", m.total_items),
    ];
    if !m.since.is_empty() {
        lines.push(format!("> **Since**: {}", m.since));
    }
    lines.extend([String::new(), "---".to_string(), String::new()]);

    if !bundle.learnings.is_empty() {
        lines.push(format!("## 📚 Learnings ({})", bundle.learnings.len()));
        lines.push(String::new());
        let mut by_agent: Vec<(&str, usize)> = Vec::new();
        for item in &bundle.learnings {
            match by_agent.iter_mut().find(|(agent, _)| *agent == item.agent) {
                Some((_, count)) => *count += 1,
                None => by_agent.push((&item.agent, 1)),
            }
        }
        by_agent.sort_by(|a, b| b.1.cmp(&a.1));
        for (agent, count) in by_agent {
            lines.push(format!("- **{}**: {} learnings", agent, count));
        }
        lines.extend([String::new(), "---".to_string(), String::new()]);
    }

    if !bundle.rules.is_empty() {
        lines.push(format!("## 📏 Rules ({})", bundle.rules.len()));
        lines.push(String::new());
        let mut by_category: Vec<(&str, usize)> = Vec::new();
        for rule in &bundle.rules {
            match by_category.iter_mut().find(|(category, _)| *category == rule.category) {
                Some((_, count)) => *count += 1,
                None => by_category.push((&rule.category, 1)),
            }
        }
        by_category.sort_by_key(|(category, _)| *category);
        for (category, count) in by_category {
            lines.push(format!("- **{}**: {} rule(s)", category, count));
        }
        lines.extend([String::new(), "---".to_string(), String::new()]);
    }

    if !bundle.dna_patches.is_empty() {
        lines.push(format!("## 🧬 DNA Patches ({})", bundle.dna_patches.len()));
        lines.push(String::new());
        for patch in &bundle.dna_patches {
            lines.push(format!("- {}", patch.filename));
        }
        lines.extend([String::new(), "---".to_string(), String::new()]);
    }

    if !bundle.agents.is_empty() {
        lines.push(format!("## 🤖 Agents ({})", bundle.agents.len()));
        lines.push(String::new());
        for agent in &bundle.agents {
            lines.push(format!("- {}", agent.filename));
        }
        lines.extend([String::new(), "---".to_string(), String::new()]);
    }

    if !bundle.consensus.is_empty() {
        lines.push(format!("## 🏛️ Consensus ({})", bundle.consensus.len()));
        lines.push(String::new());
    }
    if !bundle.antifragile.is_empty() {
        lines.push(format!("## 🛡️ Anti-Fragile ({})", bundle.antifragile.len()));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Import summary.
pub fn render_import_result(result: &ImportResult, dry_run: bool) -> String {
    let title = if dry_run { "🔍 DRY RUN" } else { "✅ Import complete" };
    let mut lines = vec![
        format!("# {}", title),
        String::new(),
        format!("- Learnings imported: **{}**", result.learnings_imported),
        format!("- Rules imported: **{}**", result.rules_imported),
        format!("- DNA patches imported: **{}**", result.dna_patches_imported),
        format!("- Agents imported: **{}**", result.agents_imported),
        format!("- Consensus imported: **{}**", result.consensus_imported),
        format!("- Anti-Fragile imported: **{}**", result.antifragile_imported),
        format!("- **Total**: {}", result.total()),
        format!("- Duplicates skipped: {}", result.skipped),
    ];

    if !result.conflicts.is_empty() {
        lines.push(String::new());
        lines.push("⚠️ Conflicts:".to_string());
        for conflict in &result.conflicts {
            lines.push(format!("  - {}", conflict));
        }
    }

    lines.join("\n")
}

/// Compare a bundle against the current project state.
pub fn render_diff(bundle: &MigrationBundle, paths: &ProjectPaths) -> String {
    let existing_learnings = export_learnings(paths, None);
    let existing_texts: HashSet<String> = existing_learnings
        .iter()
        .map(|l| l.text.trim().to_lowercase())
        .collect();
    let new_learnings = bundle
        .learnings
        .iter()
        .filter(|l| !existing_texts.contains(&l.text.trim().to_lowercase()))
        .count();

    let existing_rules = export_rules(paths, None);
    let existing_rule_texts: HashSet<String> =
        existing_rules.iter().map(|r| r.rule.trim().to_lowercase()).collect();
    let new_rules = bundle
        .rules
        .iter()
        .filter(|r| !existing_rule_texts.contains(&r.rule.trim().to_lowercase()))
        .count();

    let total_new = new_learnings
        + new_rules
        + bundle.dna_patches.len()
        + bundle.agents.len()
        + bundle.consensus.len()
        + bundle.antifragile.len();

    [
        "# 🔀 Diff: bundle vs project".to_string(),
        String::new(),
        format!("## Learnings: {} new / {} total", new_learnings, bundle.learnings.len()),
        String::new(),
        format!("## Rules: {} new / {} total", new_rules, bundle.rules.len()),
        String::new(),
        format!("## DNA Patches: {}", bundle.dna_patches.len()),
        format!("## Agents: {}", bundle.agents.len()),
        format!("## Consensus: {}", bundle.consensus.len()),
        format!("## Anti-Fragile: {}", bundle.antifragile.len()),
        String::new(),
        format!("**~{} items to import** (after deduplication)", total_new),
    ]
    .join("\n")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.learnings_dir()).unwrap();
        std::fs::create_dir_all(paths.output_dir()).unwrap();
        (dir, paths)
    }

    fn seed_source_project(paths: &ProjectPaths) {
        std::fs::write(
            paths.learnings_dir().join("dev.md"),
            "- [2026-01-05] prefer prepared statements for hot queries\n\
             - [2026-01-06] cache invalidation needs explicit ownership\n",
        )
        .unwrap();
        std::fs::write(paths.learnings_dir().join("qa.md"), "- flaky tests get quarantined first\n").unwrap();
        std::fs::write(
            paths.failure_museum(),
            "### [2026-01-10] CC-FAIL — merged without running checks\n\
             - Leçon : the gate exists for a reason\n\
             - Règle instaurée : CI must be green before merge\n\n\
             ### [2026-01-12] HALLUCINATION — invented an endpoint\n\
             - Règle instaurée : verify APIs against the OpenAPI spec\n",
        )
        .unwrap();
    }

    #[test]
    fn test_export_learnings_and_rules() {
        let (_dir, paths) = project();
        seed_source_project(&paths);

        let learnings = export_learnings(&paths, None);
        assert_eq!(learnings.len(), 3);
        assert_eq!(learnings[0].agent, "dev");
        assert_eq!(learnings[0].date, "2026-01-05");
        assert!(!learnings[0].text.contains("2026"));

        let rules = export_rules(&paths, None);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].category, "CC-FAIL");
        assert_eq!(rules[0].rule, "CI must be green before merge");
        assert_eq!(rules[0].lesson, "the gate exists for a reason");
        assert_eq!(rules[1].category, "HALLUCINATION");
        assert!(rules[1].lesson.is_empty());

        let since_rules = export_rules(&paths, Some("2026-01-11"));
        assert_eq!(since_rules.len(), 1);
    }

    #[test]
    fn test_bundle_manifest_lists_nonempty_kinds() {
        let (_dir, paths) = project();
        seed_source_project(&paths);

        let bundle = create_bundle(&paths, None, None);
        assert_eq!(bundle.manifest.magic, BUNDLE_MAGIC);
        assert_eq!(bundle.manifest.artifact_types, vec!["learnings", "rules"]);
        assert_eq!(bundle.manifest.total_items, 5);

        let only: HashSet<String> = ["rules".to_string()].into_iter().collect();
        let restricted = create_bundle(&paths, Some(&only), None);
        assert!(restricted.learnings.is_empty());
        assert_eq!(restricted.manifest.total_items, 2);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, paths) = project();
        seed_source_project(&paths);

        let bundle = create_bundle(&paths, None, None);
        let output = paths.migration_bundle();
        save_bundle(&bundle, &output).unwrap();

        let loaded = load_bundle(&output).unwrap();
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let (_dir, paths) = project();
        let output = paths.output_dir().join("fake.json");
        std::fs::write(&output, r#"{"manifest": {"magic": "not-a-bundle"}}"#).unwrap();
        assert!(matches!(load_bundle(&output), Err(CoreError::InvalidBundle(_))));

        std::fs::write(&output, "not even json").unwrap();
        assert!(matches!(load_bundle(&output), Err(CoreError::InvalidBundle(_))));
    }

    #[test]
    fn test_import_then_reimport_skips_everything() {
        let (_src_dir, source) = project();
        seed_source_project(&source);
        let bundle = create_bundle(&source, None, None);

        let (_dst_dir, target) = project();
        let result = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(result.learnings_imported, 3);
        assert_eq!(result.rules_imported, 2);
        assert_eq!(result.skipped, 0);

        let dev_file = std::fs::read_to_string(target.learnings_dir().join("dev.md")).unwrap();
        assert!(dev_file.contains("[migré] prefer prepared statements"));
        let rules_file = std::fs::read_to_string(target.migrated_rules()).unwrap();
        assert!(rules_file.contains("Règle: CI must be green before merge"));
        assert!(rules_file.starts_with("# Rules migrated"));

        // Importing the same bundle again: everything deduplicated
        let again = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(again.skipped, 5);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (_src_dir, source) = project();
        seed_source_project(&source);
        let bundle = create_bundle(&source, None, None);

        let (_dst_dir, target) = project();
        let result = import_bundle(&bundle, &target, true).unwrap();
        assert_eq!(result.total(), 5);
        assert!(!target.migrated_rules().exists());
        assert!(!target.learnings_dir().join("dev.md").exists());
    }

    #[test]
    fn test_proposal_conflicts_are_recorded() {
        let (_src_dir, source) = project();
        std::fs::create_dir_all(source.dna_proposals()).unwrap();
        std::fs::write(source.dna_proposals().join("patch-a.yaml"), "tweak: true\n").unwrap();
        let bundle = create_bundle(&source, None, None);
        assert_eq!(bundle.dna_patches.len(), 1);

        let (_dst_dir, target) = project();
        let first = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(first.dna_patches_imported, 1);

        let second = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(second.dna_patches_imported, 0);
        assert_eq!(second.conflicts.len(), 1);
        assert!(second.conflicts[0].contains("patch-a.yaml"));
    }

    #[test]
    fn test_history_merge_dedups_on_timestamp() {
        let (_dst_dir, target) = project();
        let mut bundle = MigrationBundle::default();
        bundle.manifest.source_project = "p1".to_string();
        bundle.consensus = vec![
            json!({"timestamp": "2026-01-01T00:00:00Z", "topic": "a"}),
            json!({"timestamp": "2026-01-02T00:00:00Z", "topic": "b"}),
        ];

        let first = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(first.consensus_imported, 2);

        bundle.consensus.push(json!({"timestamp": "2026-01-03T00:00:00Z", "topic": "c"}));
        let second = import_bundle(&bundle, &target, false).unwrap();
        assert_eq!(second.consensus_imported, 1);
        assert_eq!(second.skipped, 2);

        let merged = export_json_array(&target.consensus_history());
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_render_inspect_and_diff() {
        let (_src_dir, source) = project();
        seed_source_project(&source);
        let bundle = create_bundle(&source, None, None);

        let inspect = render_inspect(&bundle);
        assert!(inspect.contains("## 📚 Learnings (3)"));
        assert!(inspect.contains("## 📏 Rules (2)"));

        let (_dst_dir, target) = project();
        let diff = render_diff(&bundle, &target);
        assert!(diff.contains("Learnings: 3 new / 3 total"));
        assert!(diff.contains("~5 items to import"));
    }
}
