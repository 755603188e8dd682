//! Quality gate for fetched content.
//!
//! Runs on every successful fetch, before the text can become a snapshot,
//! including the very first snapshot of a domain.

use crate::models::{ErrorCode, SourceKind};

/// Phrases that only appear on blocked, error or maintenance pages.
const TECHNICAL_MARKERS: &[&str] = &[
    "forbidden",
    "access denied",
    "service unavailable",
    "technical maintenance",
    "temporarily unavailable",
    "доступ запрещен",
    "доступ запрещён",
    "сервис недоступен",
    "сервис временно недоступен",
    "технические работы",
    "техническое обслуживание",
];

/// A rejected fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityIssue {
    pub code: ErrorCode,
    pub message: String,
}

/// Check fetched text before it is trusted.
///
/// HTML shorter than `min_text_length` characters is `SHORT_CONTENT`; PDFs are
/// exempt from the length check. Technical-page markers fail any source.
pub fn check(text: &str, source_kind: SourceKind, min_text_length: usize) -> Option<QualityIssue> {
    let length = text.chars().count();
    if source_kind == SourceKind::Html && length < min_text_length {
        return Some(QualityIssue {
            code: ErrorCode::ShortContent,
            message: format!("Extracted text too short: {length} < {min_text_length} characters"),
        });
    }

    let lowered = text.to_lowercase();
    TECHNICAL_MARKERS
        .iter()
        .find(|marker| lowered.contains(*marker))
        .map(|marker| QualityIssue {
            code: ErrorCode::TechnicalPage,
            message: format!("Technical or blocked page marker found: '{marker}'"),
        })
}
