//! Keyword similarity between two error messages.

use std::collections::BTreeSet;

/// Words too common to say anything about an error.
const STOP_WORDS: &[&str] = &[
    "is", "not", "the", "a", "an", "of", "at", "in", "on", "for", "to", "and", "or",
];

/// Extracts the keyword set of a message.
///
/// The text is lowercased, every character outside `[a-z0-9_]` becomes a
/// separator, and tokens of three or more characters that are not stop
/// words are kept.
#[must_use]
pub fn keywords(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
        .filter(|word| word.len() > 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the keyword sets of `a` and `b`, scaled to 0..=100.
///
/// Returns 0 when either side has no keywords.
#[must_use]
pub fn similarity(a: &str, b: &str) -> u32 {
    let left = keywords(a);
    let right = keywords(b);
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    (100.0 * intersection as f64 / union as f64).round() as u32
}
