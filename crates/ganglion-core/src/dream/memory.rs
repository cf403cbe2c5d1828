//! Dream memory
//!
//! Persistent registry of insights across runs, keyed by a stable
//! signature (category + normalized title). Lets consecutive dreams tell
//! apart *new* insights, *persistent* ones (seen again → confidence
//! boost), and *resolved* ones (previously recurring, now gone).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::memory::{ProjectPaths, Result, read_json, write_json_atomic};

use super::{DreamInsight, InsightCategory, PERSISTENCE_BOOST};

/// Registry entry for one insight signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DreamMemoryEntry {
    pub title: String,
    pub category: InsightCategory,
    pub first_seen: String,
    pub last_seen: String,
    pub seen_count: u32,
    pub confidence: f64,
    /// Set when the signature stopped appearing. Operator-facing hint;
    /// nothing downstream consumes it yet.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// The registry persisted as `dream-memory.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DreamMemory {
    #[serde(default)]
    pub insights: BTreeMap<String, DreamMemoryEntry>,
    #[serde(default)]
    pub last_dream: String,
    #[serde(default)]
    pub total_dreams: u32,
}

impl DreamMemory {
    /// Load the registry; missing or corrupt files yield an empty one.
    pub fn load(paths: &ProjectPaths) -> Self {
        read_json(&paths.dream_memory()).unwrap_or_default()
    }

    pub fn save(&self, paths: &ProjectPaths) -> Result<()> {
        write_json_atomic(&paths.dream_memory(), self)
    }
}

/// Classification of one run's insights against the registry.
#[derive(Debug, Clone, Default)]
pub struct DreamDiff {
    /// Never seen before.
    pub new: Vec<DreamInsight>,
    /// Seen in a previous session too; confidence boosted.
    pub persistent: Vec<DreamInsight>,
    /// Signatures that used to recur (seen_count >= 2) and disappeared.
    pub resolved: Vec<String>,
}

impl DreamDiff {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.persistent.is_empty() && self.resolved.is_empty()
    }
}

/// Stable cross-session signature: category + title lowercased with
/// everything outside `[a-z0-9]` stripped. Minor description changes do
/// not move an insight to a new signature; distinct insights do collide
/// only if their titles normalize identically.
pub fn insight_signature(insight: &DreamInsight) -> String {
    let normalized: String = insight
        .title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("{}:{}", insight.category, normalized)
}

/// Fold this run's insights into the registry and classify them.
///
/// Persistent insights get their confidence boosted by
/// [`PERSISTENCE_BOOST`] (capped at 1.0) *after* the registry recorded the
/// un-boosted value. Signatures absent from this run are marked stale; the
/// recurring ones (seen_count >= 2) are additionally reported as resolved.
pub fn update_dream_memory(
    insights: &mut [DreamInsight],
    memory: &mut DreamMemory,
    today: NaiveDate,
) -> DreamDiff {
    let today_str = today.format("%Y-%m-%d").to_string();
    let mut diff = DreamDiff::default();
    let mut seen_signatures: Vec<String> = Vec::new();

    for insight in insights.iter_mut() {
        let signature = insight_signature(insight);
        seen_signatures.push(signature.clone());

        match memory.insights.get_mut(&signature) {
            Some(entry) => {
                entry.seen_count += 1;
                entry.last_seen = today_str.clone();
                entry.confidence = insight.confidence;
                entry.stale = false;
                insight.confidence = (insight.confidence + PERSISTENCE_BOOST).min(1.0);
                insight.confidence = (insight.confidence * 1000.0).round() / 1000.0;
                diff.persistent.push(insight.clone());
            }
            None => {
                memory.insights.insert(
                    signature,
                    DreamMemoryEntry {
                        title: insight.title.clone(),
                        category: insight.category,
                        first_seen: today_str.clone(),
                        last_seen: today_str.clone(),
                        seen_count: 1,
                        confidence: insight.confidence,
                        stale: false,
                    },
                );
                diff.new.push(insight.clone());
            }
        }
    }

    for (signature, entry) in memory.insights.iter_mut() {
        if !seen_signatures.contains(signature) {
            if entry.seen_count >= 2 {
                diff.resolved.push(signature.clone());
            }
            entry.stale = true;
        }
    }

    memory.last_dream = today_str;
    memory.total_dreams += 1;
    diff
}

// ============================================================================
// TESTS
// ============================================================================
