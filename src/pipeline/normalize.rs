//! Text normalization for comparison and for storage.
//!
//! Comparison form is lossy on purpose: case, punctuation and spacing never
//! count as a change. Storage form keeps line structure so diffs stay readable.

use std::sync::LazyLock;

use regex::Regex;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").expect("punctuation pattern is valid"));

/// Case-fold, strip punctuation and collapse all whitespace to single spaces.
pub fn normalize_for_compare(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim lines, collapse whitespace inside them and drop blank lines.
pub fn normalize_for_storage(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether two texts differ once case, punctuation and spacing are ignored.
pub fn is_changed(previous: &str, current: &str) -> bool {
    normalize_for_compare(previous) != normalize_for_compare(current)
}
