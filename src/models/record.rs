//! Per-target verdicts and run summaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ErrorCode, SourceKind};

/// Final status of one target in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    New,
    Changed,
    Unchanged,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Changed => "CHANGED",
            Status::Unchanged => "UNCHANGED",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity bucket for a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeLevel {
    Noise,
    Minor,
    Major,
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeLevel::Noise => "NOISE",
            ChangeLevel::Minor => "MINOR",
            ChangeLevel::Major => "MAJOR",
        })
    }
}

/// What a run did with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Seed baselines: every accepted fetch is stored and reported NEW
    Init,
    /// Compare against stored snapshots
    Run,
    /// Replay only the URLs recorded as failed by the previous run
    RerunFailed,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Init => "init",
            RunMode::Run => "run",
            RunMode::RerunFailed => "rerun-failed",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details carried only by CHANGED records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeDetails {
    pub change_level: ChangeLevel,
    pub change_ratio: f64,
    /// Short document with a very large measured change; needs operator review
    pub suspicious: bool,
    pub diff_html: String,
}

/// Details carried only by FAILED records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDetails {
    pub error_code: ErrorCode,
    pub error_message: String,
}

/// Status plus the fields that exist only for that status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum Verdict {
    New,
    Unchanged,
    Changed(ChangeDetails),
    Failed(FailureDetails),
}

/// Outcome for one target in one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub domain: String,
    pub url: String,
    pub source_kind: Option<SourceKind>,
    pub duration_secs: f64,
    pub text_length: Option<usize>,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ResultRecord {
    pub fn new_snapshot(
        domain: &str,
        url: &str,
        source_kind: SourceKind,
        duration_secs: f64,
        text_length: usize,
    ) -> Self {
        Self::accepted(domain, url, source_kind, duration_secs, text_length, Verdict::New)
    }

    pub fn unchanged(
        domain: &str,
        url: &str,
        source_kind: SourceKind,
        duration_secs: f64,
        text_length: usize,
    ) -> Self {
        Self::accepted(
            domain,
            url,
            source_kind,
            duration_secs,
            text_length,
            Verdict::Unchanged,
        )
    }

    pub fn changed(
        domain: &str,
        url: &str,
        source_kind: SourceKind,
        duration_secs: f64,
        text_length: usize,
        details: ChangeDetails,
    ) -> Self {
        Self::accepted(
            domain,
            url,
            source_kind,
            duration_secs,
            text_length,
            Verdict::Changed(details),
        )
    }

    pub fn failed(
        domain: &str,
        url: &str,
        duration_secs: f64,
        error_code: ErrorCode,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            url: url.to_string(),
            source_kind: None,
            duration_secs,
            text_length: None,
            verdict: Verdict::Failed(FailureDetails {
                error_code,
                error_message: error_message.into(),
            }),
        }
    }

    fn accepted(
        domain: &str,
        url: &str,
        source_kind: SourceKind,
        duration_secs: f64,
        text_length: usize,
        verdict: Verdict,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            url: url.to_string(),
            source_kind: Some(source_kind),
            duration_secs,
            text_length: Some(text_length),
            verdict,
        }
    }

    pub fn status(&self) -> Status {
        match self.verdict {
            Verdict::New => Status::New,
            Verdict::Unchanged => Status::Unchanged,
            Verdict::Changed(_) => Status::Changed,
            Verdict::Failed(_) => Status::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.verdict, Verdict::Failed(_))
    }

    pub fn change(&self) -> Option<&ChangeDetails> {
        match &self.verdict {
            Verdict::Changed(details) => Some(details),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureDetails> {
        match &self.verdict {
            Verdict::Failed(details) => Some(details),
            _ => None,
        }
    }
}

/// Aggregate numbers for one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub tenant: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Domains whose change was flagged for operator review
    pub suspicious: Vec<String>,
}

impl RunSummary {
    pub fn from_records(
        mode: RunMode,
        tenant: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        records: &[ResultRecord],
    ) -> Self {
        let count = |status: Status| records.iter().filter(|r| r.status() == status).count();
        let suspicious = records
            .iter()
            .filter(|r| r.change().is_some_and(|c| c.suspicious))
            .map(|r| r.domain.clone())
            .collect();

        Self {
            mode,
            tenant: tenant.to_string(),
            started_at,
            finished_at,
            total: records.len(),
            new: count(Status::New),
            changed: count(Status::Changed),
            unchanged: count(Status::Unchanged),
            failed: count(Status::Failed),
            suspicious,
        }
    }
}
