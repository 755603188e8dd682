//! Heuristic classification of untyped failures.
//!
//! Errors that surface from the browser driver or the network stack carry no
//! code. They are matched top-down against [`ERROR_RULES`]; the first rule
//! with a matching substring wins and `UNKNOWN` is the fallback.

use crate::error::AppError;
use crate::models::ErrorCode;

/// A set of lowercase substrings that map a failure message to a code.
#[derive(Debug, Clone, Copy)]
pub struct ErrorRule {
    pub code: ErrorCode,
    pub patterns: &'static [&'static str],
}

/// Ordered reclassification table.
pub const ERROR_RULES: &[ErrorRule] = &[
    ErrorRule {
        code: ErrorCode::BotDetected,
        patterns: &[
            "captcha",
            "bot detected",
            "are you human",
            "are you a robot",
            "cf-chl",
            "challenge-platform",
        ],
    },
    ErrorRule {
        code: ErrorCode::Timeout,
        patterns: &["timeout", "timed out", "deadline has elapsed"],
    },
    ErrorRule {
        code: ErrorCode::Proxy,
        patterns: &[
            "proxy",
            "407",
            "err_tunnel_connection_failed",
        ],
    },
    ErrorRule {
        code: ErrorCode::Network,
        patterns: &[
            "err_name_not_resolved",
            "dns error",
            "failed to lookup address",
            "connection refused",
            "connection reset",
            "err_connection",
            "err_internet_disconnected",
            "err_address_unreachable",
            "error sending request",
            "certificate",
            "ssl",
            "network",
        ],
    },
    ErrorRule {
        code: ErrorCode::Browser,
        patterns: &[
            "browser",
            "chrome",
            "chromium",
            "target closed",
            "websocket",
            "page crashed",
        ],
    },
];

/// Classify a failure message against [`ERROR_RULES`].
pub fn classify_message(message: &str) -> ErrorCode {
    classify_with(ERROR_RULES, message)
}

/// Classify a failure message against a custom rule table.
pub fn classify_with(rules: &[ErrorRule], message: &str) -> ErrorCode {
    let lowered = message.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lowered.contains(p)))
        .map_or(ErrorCode::Unknown, |rule| rule.code)
}

/// Code for any error: its own code when typed, the table otherwise.
///
/// The table sees the underlying failure text, never the variant prefix.
pub fn classify_error(error: &AppError) -> ErrorCode {
    error
        .error_code()
        .unwrap_or_else(|| classify_message(&error.detail()))
}

/// Whether a download failure was caused by proxy authentication.
pub fn is_proxy_auth_failure(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("407") || lowered.contains("proxy authentication")
}
