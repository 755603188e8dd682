//! Local filesystem snapshot store.
//!
//! Every write goes to a temp file first and is renamed into place, so a
//! crash mid-write never leaves a truncated snapshot behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{RunReport, SnapshotStore};

const STATE_DIR: &str = "state";
const RUNS_DIR: &str = "runs";
const CURRENT_FILE: &str = "current.txt";
const PREVIOUS_FILE: &str = "previous.txt";
const LEDGER_FILE: &str = "last_failed_urls.txt";

/// Filesystem store rooted at `{data_dir}/{tenant}`.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    root_dir: PathBuf,
}

impl LocalSnapshotStore {
    /// Create a store rooted at the tenant directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding one domain's snapshots.
    fn domain_dir(&self, domain: &str) -> Result<PathBuf> {
        validate_domain_key(domain)?;
        Ok(self.root_dir.join(STATE_DIR).join(domain))
    }

    fn ledger_path(&self) -> PathBuf {
        self.root_dir.join(LEDGER_FILE)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read a UTF-8 file, returning None if it doesn't exist.
    async fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// A domain must be a single path component.
fn validate_domain_key(domain: &str) -> Result<()> {
    let unsafe_key = domain.is_empty()
        || domain.contains(['/', '\\', '\0'])
        || domain.contains("..")
        || domain.starts_with('.');
    if unsafe_key {
        return Err(AppError::validation(format!(
            "Unsafe domain key for storage: {domain:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn read_current(&self, domain: &str) -> Result<Option<String>> {
        let path = self.domain_dir(domain)?.join(CURRENT_FILE);
        self.read_text(&path).await
    }

    async fn read_previous(&self, domain: &str) -> Result<Option<String>> {
        let path = self.domain_dir(domain)?.join(PREVIOUS_FILE);
        self.read_text(&path).await
    }

    async fn write_and_rotate(&self, domain: &str, text: &str) -> Result<()> {
        let dir = self.domain_dir(domain)?;
        let current = dir.join(CURRENT_FILE);

        if let Some(existing) = self.read_text(&current).await? {
            self.write_bytes(&dir.join(PREVIOUS_FILE), existing.as_bytes())
                .await?;
        }
        self.write_bytes(&current, text.as_bytes()).await?;
        log::debug!("Snapshot written for {domain} ({} bytes)", text.len());
        Ok(())
    }

    async fn read_failed_urls(&self) -> Result<Vec<String>> {
        let Some(text) = self.read_text(&self.ledger_path()).await? else {
            return Ok(Vec::new());
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn write_failed_urls(&self, urls: &[String]) -> Result<()> {
        let mut sorted: Vec<&str> = urls.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut body = sorted.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        self.write_bytes(&self.ledger_path(), body.as_bytes()).await?;
        log::info!("Failed-URL ledger updated: {} entries", sorted.len());
        Ok(())
    }

    async fn write_run_report(&self, report: &RunReport) -> Result<PathBuf> {
        let file_name = format!(
            "run-{}-{}.json",
            report.summary.mode,
            report.summary.started_at.format("%Y%m%d-%H%M%S-%3f")
        );
        let path = self.root_dir.join(RUNS_DIR).join(file_name);
        let bytes = serde_json::to_vec_pretty(report)?;
        self.write_bytes(&path, &bytes).await?;
        Ok(path)
    }
}
