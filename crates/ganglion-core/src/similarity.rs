//! Keyword similarity kernel
//!
//! Jaccard similarity over keyword sets extracted from short free-text
//! entries. Used everywhere two memory entries must be compared: dream
//! cross-connections, tension detection, duplicate/contradiction linting,
//! insight deduplication, and the local semantic store.
//!
//! Keywords are unigrams plus bigrams of adjacent significant tokens, so
//! "cache invalidation" and "invalidation cache" do not collapse into the
//! same set. The stopword list is bilingual (FR/EN) because memory files
//! commonly mix both languages.

use std::collections::HashSet;

/// Bilingual stopword set. Tokens in this list never become keywords and
/// break bigram adjacency.
const STOPWORDS: &[&str] = &[
    // French
    "le", "la", "les", "de", "du", "des", "un", "une", "et", "ou", "en",
    "à", "au", "aux", "pour", "par", "sur", "dans", "avec", "que", "qui",
    "est", "sont", "a", "ont", "sera", "seront", "pas", "ne", "ni", "mais",
    // English
    "the", "an", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "shall",
    "should", "may", "might", "can", "could", "of", "to", "in", "for",
    "on", "with", "at", "by", "from", "as", "into", "about", "between",
    "after", "before", "not", "no", "but", "or", "and", "if", "then",
    "than", "too", "very", "just", "don", "it", "its", "this", "that",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// True for the alphabetic characters we tokenize on: ASCII letters plus
/// the Latin-1 accented range used by French text.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{C0}'..='\u{FF}').contains(&c)
}

/// Lowercased alphabetic tokens of length >= 3, in document order.
fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in lower.chars() {
        if is_word_char(c) {
            current.push(c);
        } else if !current.is_empty() {
            if current.chars().count() >= 3 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= 3 {
        tokens.push(current);
    }
    tokens
}

/// Extract the keyword set of a text: significant unigrams plus bigrams of
/// consecutive significant tokens (a stopword between two words breaks the
/// pair). Bigrams are joined with `_`.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    let words = tokenize(text);
    let mut result: HashSet<String> = HashSet::new();

    let mut prev_significant: Option<&str> = None;
    for word in &words {
        if is_stopword(word) {
            prev_significant = None;
            continue;
        }
        if let Some(prev) = prev_significant {
            result.insert(format!("{}_{}", prev, word));
        }
        result.insert(word.clone());
        prev_significant = Some(word);
    }

    result
}

/// Unigram-only keyword set. The linter boundary compares on this looser
/// set: its thresholds (0.25-0.75) are calibrated without bigram dilution.
pub fn extract_unigrams(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}

fn jaccard(ka: &HashSet<String>, kb: &HashSet<String>) -> f64 {
    if ka.is_empty() || kb.is_empty() {
        return 0.0;
    }
    let intersection = ka.intersection(kb).count();
    let union = ka.union(kb).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Jaccard similarity between the keyword sets of two texts.
///
/// Deterministic, symmetric, case-insensitive. Returns 0.0 when either
/// keyword set is empty; identical non-empty inputs score exactly 1.0.
pub fn similarity(text_a: &str, text_b: &str) -> f64 {
    jaccard(&extract_keywords(text_a), &extract_keywords(text_b))
}

/// Jaccard over unigram sets only. Used by the memory linter.
pub fn unigram_similarity(text_a: &str, text_b: &str) -> f64 {
    jaccard(&extract_unigrams(text_a), &extract_unigrams(text_b))
}

/// Truncate a string to at most `max_chars` characters (UTF-8 safe).
/// Shared by report renderers that quote memory entries.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
