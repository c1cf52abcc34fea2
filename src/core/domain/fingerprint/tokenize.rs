//! Title tokenization and token-set similarity.

use std::collections::HashSet;

/// Lowercase a title, strip punctuation, and collapse whitespace into a
/// token sequence.
#[must_use]
pub fn tokenize(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token set for similarity comparisons.
#[must_use]
pub fn token_set(title: &str) -> HashSet<String> {
    tokenize(title).into_iter().collect()
}

/// Jaccard similarity over two token sets, in [0, 1].
///
/// Two empty sets compare as 0 rather than 1: a pair of empty titles gives
/// the scorer no evidence.
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Jaccard similarity computed straight from two titles.
#[must_use]
pub fn title_jaccard(left: &str, right: &str) -> f64 {
    jaccard(&token_set(left), &token_set(right))
}
