//! Error text normalization and classification.
//!
//! Failure reports from agents carry noise that differs between two
//! occurrences of the same bug: line numbers, file paths, quoted variable
//! names. [`normalize`] strips that noise so equivalent errors compare equal,
//! and [`classify`] pulls out a well-known error type name.

use once_cell::sync::Lazy;
use regex::Regex;

/// Well-known error type names, in priority order.
///
/// [`classify`] returns the first entry contained in the text, so the order
/// matters: the generic `Error` sits ahead of the Python-specific names and
/// shadows them.
pub const ERROR_TYPES: &[&str] = &[
    "ReferenceError",
    "TypeError",
    "SyntaxError",
    "RangeError",
    "URIError",
    "EvalError",
    "Error",
    "ModuleNotFoundError",
    "ImportError",
    "AttributeError",
    "KeyError",
    "ValueError",
    "IndexError",
    "NameError",
    "FileNotFoundError",
    "ConnectionError",
    "TimeoutError",
    "PermissionError",
];

/// Upper bound on rewrite passes; real inputs settle in one or two.
const MAX_PASSES: usize = 64;

/// A single rewrite rule: pattern and replacement.
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

#[allow(clippy::expect_used)] // patterns are compile-time constants
fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("static normalization pattern"),
        replacement,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        // location suffixes
        rule(r"(?i)\s+at\s+line\s+\d+", ""),
        rule(r"(?i)\s+at\s+.*:\d+:\d+", ""),
        rule(r"(?i)line\s+\d+", ""),
        rule(r":\d+:\d+", ""),
        // quoted literals
        rule(r"'[^']+'", "'...'"),
        rule(r#""[^"]+""#, r#""...""#),
        // call detail
        rule(r"\([^)]*action=[^)]*\)", ""),
        rule(r"\([^)]*code=[^)]*\)", ""),
        // absolute paths
        rule(r"[A-Za-z]:\\\S+", ""),
        rule(r"(?i)/\S+\.[a-z]+", ""),
    ]
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\s+").expect("static whitespace pattern")
});

fn rewrite_once(text: &str) -> String {
    let mut out = text.to_string();
    for rule in RULES.iter() {
        out = rule.pattern.replace_all(&out, rule.replacement).into_owned();
    }
    WHITESPACE.replace_all(&out, " ").trim().to_string()
}

/// Normalizes an error message by removing its volatile parts.
///
/// Removes `at line N` and `at file:line:col` suffixes, bare `line N`
/// tokens, `:N:N` suffixes, parenthesized argument lists containing
/// `action=` or `code=`, and absolute POSIX or drive-letter paths. Quoted
/// literals collapse to `'...'` / `"..."`. Whitespace is collapsed and
/// trimmed.
///
/// The rewrite is repeated until the text stops changing, so
/// `normalize(normalize(x)) == normalize(x)` for every input.
///
/// # Examples
///
/// ```
/// use symbiont_core::normalize;
///
/// assert_eq!(
///     normalize("TypeError: Cannot read property 'x' of undefined at line 12"),
///     "TypeError: Cannot read property '...' of undefined"
/// );
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut current = rewrite_once(raw);
    for _ in 1..MAX_PASSES {
        let next = rewrite_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Returns the first well-known error type contained in `raw`.
///
/// Matching is plain substring containment against [`ERROR_TYPES`] in its
/// declared order.
#[must_use]
pub fn classify(raw: &str) -> Option<&'static str> {
    ERROR_TYPES.iter().copied().find(|name| raw.contains(name))
}
