//! Storage abstractions for snapshots and run artifacts.
//!
//! ## Directory Structure
//!
//! ```text
//! {data_dir}/{tenant}/
//! ├── state/
//! │   └── {domain}/
//! │       ├── current.txt       # Latest accepted text
//! │       └── previous.txt      # Text it replaced
//! ├── last_failed_urls.txt      # Ledger for rerun-failed
//! └── runs/
//!     └── run-{mode}-{ts}.json  # Records + summary for the report writer
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ResultRecord, RunSummary};

pub use local::LocalSnapshotStore;

/// Everything one finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Sorted by domain
    pub records: Vec<ResultRecord>,
}

/// Trait for snapshot storage backends.
///
/// Domains are keys; implementations must reject keys that could escape the
/// tenant namespace.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Latest accepted text for a domain, if any.
    async fn read_current(&self, domain: &str) -> Result<Option<String>>;

    /// Text that `current` replaced, if any.
    async fn read_previous(&self, domain: &str) -> Result<Option<String>>;

    /// Move `current` to `previous` (when it exists), then write `text` as
    /// the new `current`.
    async fn write_and_rotate(&self, domain: &str, text: &str) -> Result<()>;

    /// URLs recorded as failed by the last completed run.
    async fn read_failed_urls(&self) -> Result<Vec<String>>;

    /// Replace the failed-URL ledger.
    async fn write_failed_urls(&self, urls: &[String]) -> Result<()>;

    /// Persist a run report and return where it was written.
    async fn write_run_report(&self, report: &RunReport) -> Result<PathBuf>;
}
