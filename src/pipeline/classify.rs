//! Change magnitude classification.
//!
//! Both texts are reduced to lowercase alphanumeric tokens (Latin and
//! Cyrillic) and compared with a character-level sequence alignment.
//! `change_ratio = 1 - similarity`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use similar::TextDiff;

use crate::models::ChangeLevel;

/// Below this ratio a change is formatting noise.
pub const NOISE_THRESHOLD: f64 = 0.015;
/// Below this ratio a change is minor.
pub const MINOR_THRESHOLD: f64 = 0.12;

const SUSPICIOUS_RATIO: f64 = 0.3;
const SUSPICIOUS_MAX_LENGTH: usize = 2500;

/// Upper bound on alignment time; past it the diff falls back to a coarser match.
const ALIGNMENT_TIMEOUT: Duration = Duration::from_secs(5);

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9а-яё]+").expect("token pattern is valid"));

/// Bucket the change between two stored texts.
pub fn classify(previous: &str, current: &str) -> (ChangeLevel, f64) {
    let prev = token_string(previous);
    let curr = token_string(current);

    let similarity = TextDiff::configure()
        .timeout(ALIGNMENT_TIMEOUT)
        .diff_chars(prev.as_str(), curr.as_str())
        .ratio() as f64;
    let ratio = (1.0 - similarity).clamp(0.0, 1.0);

    (level_for(ratio), ratio)
}

/// Map a change ratio onto its level.
pub fn level_for(ratio: f64) -> ChangeLevel {
    if ratio < NOISE_THRESHOLD {
        ChangeLevel::Noise
    } else if ratio < MINOR_THRESHOLD {
        ChangeLevel::Minor
    } else {
        ChangeLevel::Major
    }
}

/// A short document with a very large change is more likely a page swap
/// than a genuine edit.
pub fn is_suspicious(level: ChangeLevel, ratio: f64, text_length: usize) -> bool {
    level == ChangeLevel::Major && ratio >= SUSPICIOUS_RATIO && text_length < SUSPICIOUS_MAX_LENGTH
}

fn token_string(text: &str) -> String {
    let lowered = text.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
