//! Fetch outcome and the failure taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the document text was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Html,
    Pdf,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Html => "HTML",
            SourceKind::Pdf => "PDF",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy shared by the fetcher, the quality gate and the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BotDetected,
    TechnicalPage,
    ShortContent,
    Timeout,
    Network,
    Proxy,
    Browser,
    PdfDownload,
    PdfParse,
    EmptyContent,
    Parser,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BotDetected => "BOT_DETECTED",
            ErrorCode::TechnicalPage => "TECHNICAL_PAGE",
            ErrorCode::ShortContent => "SHORT_CONTENT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Network => "NETWORK",
            ErrorCode::Proxy => "PROXY",
            ErrorCode::Browser => "BROWSER",
            ErrorCode::PdfDownload => "PDF_DOWNLOAD",
            ErrorCode::PdfParse => "PDF_PARSE",
            ErrorCode::EmptyContent => "EMPTY_CONTENT",
            ErrorCode::Parser => "PARSER",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempt sequence for one target.
///
/// A failed outcome always carries an error code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub ok: bool,
    pub text: String,
    pub source_kind: SourceKind,
    /// 1-based index of the attempt that produced this outcome
    pub attempt: usize,
    /// Proxy used by that attempt, as `host:port`
    pub proxy_used: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
}

impl FetchOutcome {
    pub fn success(
        text: String,
        source_kind: SourceKind,
        attempt: usize,
        proxy_used: Option<String>,
    ) -> Self {
        Self {
            ok: true,
            text,
            source_kind,
            attempt,
            proxy_used,
            error_code: None,
            error_message: None,
        }
    }

    pub fn failure(
        code: ErrorCode,
        message: impl Into<String>,
        attempt: usize,
        proxy_used: Option<String>,
    ) -> Self {
        Self {
            ok: false,
            text: String::new(),
            source_kind: SourceKind::Html,
            attempt,
            proxy_used,
            error_code: Some(code),
            error_message: Some(message.into()),
        }
    }
}
