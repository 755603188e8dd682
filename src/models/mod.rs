// src/models/mod.rs

//! Domain models for the change radar.
//!
//! This module contains all data structures shared by the fetcher, the
//! pipeline stages and the storage layer.

mod config;
mod fetch;
mod record;
mod target;

// Re-export all public types
pub use config::{BrowserConfig, Config, FetchConfig, HumanAction, LoggingConfig, PathsConfig};
pub use fetch::{ErrorCode, FetchOutcome, SourceKind};
pub use record::{
    ChangeDetails, ChangeLevel, FailureDetails, ResultRecord, RunMode, RunSummary, Status,
    Verdict,
};
pub use target::{ProxyEndpoint, Target};
