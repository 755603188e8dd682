// src/error.rs

//! Unified error handling for the change radar.

use std::fmt;

use thiserror::Error;

use crate::models::ErrorCode;

/// Result type alias for radar operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error; aborts the run before any fetching
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Typed pipeline failure raised where it was detected
    #[error("{code}: {message}")]
    Fetch { code: ErrorCode, message: String },

    /// Untyped failure surfacing from the browser driver
    #[error("Browser error: {0}")]
    Browser(String),

    /// The run was interrupted before all targets settled
    #[error("Run cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a typed fetch error.
    pub fn fetch(code: ErrorCode, message: impl fmt::Display) -> Self {
        Self::Fetch {
            code,
            message: message.to_string(),
        }
    }

    /// Create a browser driver error.
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// The error code if this error was raised with one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Fetch { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Underlying failure text without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Io(e) => e.to_string(),
            Self::Http(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
            Self::Toml(e) => e.to_string(),
            Self::Url(e) => e.to_string(),
            Self::Config(m) | Self::Validation(m) | Self::Browser(m) => m.clone(),
            Self::Fetch { message, .. } => message.clone(),
            Self::Cancelled => self.to_string(),
        }
    }

    /// Human readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Fetch { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_carries_code() {
        let err = AppError::fetch(ErrorCode::BotDetected, "captcha page");
        assert_eq!(err.error_code(), Some(ErrorCode::BotDetected));
        assert_eq!(err.message(), "captcha page");
        assert_eq!(err.to_string(), "BOT_DETECTED: captcha page");
    }

    #[test]
    fn test_untyped_error_has_no_code() {
        let err = AppError::browser("Target closed");
        assert_eq!(err.error_code(), None);
        assert_eq!(err.message(), "Browser error: Target closed");
        assert_eq!(err.detail(), "Target closed");
    }
}
