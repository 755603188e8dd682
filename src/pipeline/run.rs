// src/pipeline/run.rs

//! Run orchestration.
//!
//! Every target goes through the same state machine in its own task:
//! fetch, quality gate, normalize, compare with the stored snapshot, then
//! write and report. Failed domains get exactly one retry pass. The run ends
//! by writing the failed-URL ledger and the run report.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use log::Level;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::normalize::{is_changed, normalize_for_storage};
use super::{classify, diff, quality};
use crate::config::targets_from_urls;
use crate::error::{AppError, Result};
use crate::models::{
    ChangeDetails, Config, ErrorCode, FetchOutcome, ProxyEndpoint, ResultRecord, RunMode,
    RunSummary, Target,
};
use crate::services::{BrowserDriver, ContentFetcher, FetchSettings};
use crate::storage::{RunReport, SnapshotStore};
use crate::utils::log::RunLogger;

/// Per-target state machine shared by all tasks of a run.
struct TargetWorker {
    fetcher: ContentFetcher,
    store: Arc<dyn SnapshotStore>,
    proxies: Vec<ProxyEndpoint>,
    mode: RunMode,
    min_text_length: usize,
    logger: RunLogger,
}

impl TargetWorker {
    async fn process(&self, target: &Target) -> ResultRecord {
        let started = Instant::now();
        let outcome = self.fetcher.fetch(target, &self.proxies).await;

        let record = if outcome.ok {
            match self.accept(target, outcome, started).await {
                Ok(record) => record,
                Err(e) => ResultRecord::failed(
                    &target.domain,
                    &target.url,
                    started.elapsed().as_secs_f64(),
                    e.error_code().unwrap_or(ErrorCode::Unknown),
                    e.message(),
                ),
            }
        } else {
            ResultRecord::failed(
                &target.domain,
                &target.url,
                started.elapsed().as_secs_f64(),
                outcome.error_code.unwrap_or(ErrorCode::Unknown),
                outcome.error_message.unwrap_or_default(),
            )
        };

        self.log_record(&record);
        record
    }

    /// Everything after a successful fetch. Errors here (storage, change
    /// analysis) become FAILED records with their own code or UNKNOWN.
    async fn accept(
        &self,
        target: &Target,
        outcome: FetchOutcome,
        started: Instant,
    ) -> Result<ResultRecord> {
        let domain = target.domain.as_str();
        let text = normalize_for_storage(&outcome.text);
        let kind = outcome.source_kind;
        let elapsed = || started.elapsed().as_secs_f64();

        if let Some(issue) = quality::check(&text, kind, self.min_text_length) {
            return Ok(ResultRecord::failed(
                domain,
                &target.url,
                elapsed(),
                issue.code,
                issue.message,
            ));
        }
        let length = text.chars().count();

        let previous = match self.mode {
            RunMode::Init => None,
            RunMode::Run | RunMode::RerunFailed => self.store.read_current(domain).await?,
        };
        let Some(previous) = previous else {
            self.store.write_and_rotate(domain, &text).await?;
            return Ok(ResultRecord::new_snapshot(
                domain,
                &target.url,
                kind,
                elapsed(),
                length,
            ));
        };

        if !is_changed(&previous, &text) {
            return Ok(ResultRecord::unchanged(
                domain,
                &target.url,
                kind,
                elapsed(),
                length,
            ));
        }

        let current = text.clone();
        let (change_level, change_ratio, diff_html) = tokio::task::spawn_blocking(move || {
            let (level, ratio) = classify::classify(&previous, &current);
            (level, ratio, diff::render(&previous, &current))
        })
        .await
        .map_err(|e| AppError::fetch(ErrorCode::Unknown, format!("Change analysis failed: {e}")))?;
        let details = ChangeDetails {
            change_level,
            change_ratio,
            suspicious: classify::is_suspicious(change_level, change_ratio, length),
            diff_html,
        };
        self.store.write_and_rotate(domain, &text).await?;

        Ok(ResultRecord::changed(
            domain,
            &target.url,
            kind,
            elapsed(),
            length,
            details,
        ))
    }

    fn log_record(&self, record: &ResultRecord) {
        let status = record.status();
        let duration = format!("{:.2}s", record.duration_secs);
        let domain = &record.domain;

        if let Some(failure) = record.failure() {
            self.logger.event(
                Level::Warn,
                status.as_str(),
                &[
                    ("domain", domain),
                    ("code", &failure.error_code),
                    ("error", &failure.error_message),
                    ("duration", &duration),
                ],
            );
        } else if let Some(change) = record.change() {
            self.logger.event(
                Level::Info,
                status.as_str(),
                &[
                    ("domain", domain),
                    ("level", &change.change_level),
                    ("ratio", &format!("{:.4}", change.change_ratio)),
                    ("suspicious", &change.suspicious),
                    ("duration", &duration),
                ],
            );
        } else {
            let source = record.source_kind.map_or("-", |k| k.as_str());
            self.logger.event(
                Level::Info,
                status.as_str(),
                &[
                    ("domain", domain),
                    ("source", &source),
                    ("length", &record.text_length.unwrap_or_default()),
                    ("duration", &duration),
                ],
            );
        }
    }
}

/// Drives one run for one tenant.
pub struct RunOrchestrator {
    worker: Arc<TargetWorker>,
    store: Arc<dyn SnapshotStore>,
    concurrency: usize,
    logger: RunLogger,
}

impl RunOrchestrator {
    pub fn new(
        config: &Config,
        mode: RunMode,
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn SnapshotStore>,
        proxies: Vec<ProxyEndpoint>,
    ) -> Self {
        let logger = RunLogger::new(&config.tenant, mode);
        let fetcher = ContentFetcher::new(
            driver,
            config.browser.clone(),
            FetchSettings::from(&config.fetch),
            logger.clone(),
        );
        let worker = TargetWorker {
            fetcher,
            store: Arc::clone(&store),
            proxies,
            mode,
            min_text_length: config.fetch.min_text_length,
            logger: logger.clone(),
        };

        Self {
            worker: Arc::new(worker),
            store,
            concurrency: config.fetch.concurrency.max(1),
            logger,
        }
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Run every target, retry failures once, then persist the ledger and
    /// the run report.
    ///
    /// An empty target list is a configuration error.
    pub async fn run(&self, targets: Vec<Target>, cancel: CancellationToken) -> Result<RunReport> {
        if targets.is_empty() {
            return Err(AppError::config("No targets configured"));
        }
        self.execute(targets, cancel).await
    }

    /// Replay the URLs recorded as failed by the last completed run.
    ///
    /// An empty ledger means there is nothing to do; nothing is written.
    pub async fn rerun_failed(&self, cancel: CancellationToken) -> Result<RunReport> {
        let urls = self.store.read_failed_urls().await?;
        let targets = targets_from_urls(&urls);
        if targets.is_empty() {
            self.logger.info("No failed URLs recorded; nothing to rerun");
            let now = Utc::now();
            return Ok(RunReport {
                summary: RunSummary::from_records(
                    self.logger.mode(),
                    self.logger.tenant(),
                    now,
                    now,
                    &[],
                ),
                records: Vec::new(),
            });
        }
        self.execute(targets, cancel).await
    }

    async fn execute(&self, targets: Vec<Target>, cancel: CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        self.logger.header(&format!(
            "tos-radar {} for tenant '{}' ({} targets, run {})",
            self.logger.mode(),
            self.logger.tenant(),
            targets.len(),
            self.logger.run_id()
        ));

        self.logger.step(1, 3, "Fetching targets");
        let mut results = self.process_all(targets, &cancel).await?;

        let retry: Vec<Target> = results
            .values()
            .filter(|r| r.is_failed())
            .map(|r| Target::new(r.domain.clone(), r.url.clone()))
            .collect();
        if retry.is_empty() {
            self.logger.step(2, 3, "No failed targets to retry");
        } else {
            self.logger
                .step(2, 3, &format!("Retrying {} failed targets", retry.len()));
            // Retry outcomes replace the first-pass record whatever they are.
            results.extend(self.process_all(retry, &cancel).await?);
        }

        self.logger.step(3, 3, "Writing ledger and run report");
        let records: Vec<ResultRecord> = results.into_values().collect();
        let failed_urls: Vec<String> = records
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.url.clone())
            .collect();
        self.store.write_failed_urls(&failed_urls).await?;

        let summary = RunSummary::from_records(
            self.logger.mode(),
            self.logger.tenant(),
            started_at,
            Utc::now(),
            &records,
        );
        let report = RunReport { summary, records };
        let path = self.store.write_run_report(&report).await?;
        self.logger
            .info(&format!("Run report written to {}", path.display()));

        Ok(report)
    }

    /// One pass over `targets`, keyed and sorted by domain.
    async fn process_all(
        &self,
        targets: Vec<Target>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, ResultRecord>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for target in targets {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let started = Instant::now();
                match AssertUnwindSafe(worker.process(&target))
                    .catch_unwind()
                    .await
                {
                    Ok(record) => record,
                    Err(panic) => {
                        let record = ResultRecord::failed(
                            &target.domain,
                            &target.url,
                            started.elapsed().as_secs_f64(),
                            ErrorCode::Unknown,
                            format!("Target task panicked: {}", panic_message(panic.as_ref())),
                        );
                        worker.log_record(&record);
                        record
                    }
                }
            });
        }

        let mut results = BTreeMap::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.logger.warn("Cancellation requested; stopping outstanding targets");
                    join_set.shutdown().await;
                    return Err(AppError::Cancelled);
                }
                next = join_set.join_next() => match next {
                    None => break,
                    Some(Ok(record)) => {
                        results.insert(record.domain.clone(), record);
                    }
                    // Task bodies catch their own panics; only an abort lands here.
                    Some(Err(join_error)) => {
                        self.logger.error(&format!("Target task ended abnormally: {join_error}"));
                    }
                }
            }
        }
        Ok(results)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{ChangeLevel, HumanAction, Status};
    use crate::services::PageSession;
    use crate::storage::LocalSnapshotStore;

    /// Serves scripted HTML per URL; each open consumes one script entry.
    #[derive(Default)]
    struct ScriptedDriver {
        scripts: Mutex<HashMap<String, VecDeque<std::result::Result<String, String>>>>,
        panic_on: Option<String>,
        open_delay: Option<Duration>,
        opens: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl ScriptedDriver {
        fn page(self, url: &str, body: &str) -> Self {
            let html = format!("<html><head><title>Terms</title></head><body><main>{body}</main></body></html>");
            self.push(url, Ok(html))
        }

        fn failure(self, url: &str, message: &str) -> Self {
            self.push(url, Err(message.to_string()))
        }

        fn open_count(&self, url: &str) -> usize {
            self.opens.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        fn push(self, url: &str, entry: std::result::Result<String, String>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(entry);
            self
        }
    }

    struct StaticPage(Option<String>);

    #[async_trait]
    impl BrowserDriver for ScriptedDriver {
        async fn open(
            &self,
            url: &str,
            _timeout: Duration,
            _proxy: Option<&ProxyEndpoint>,
            _profile: &crate::models::BrowserConfig,
        ) -> Result<Box<dyn PageSession>> {
            if self.panic_on.as_deref() == Some(url) {
                panic!("driver defect");
            }
            *self.opens.lock().unwrap().entry(url.to_string()).or_default() += 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.open_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let entry = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err("net::ERR_NAME_NOT_RESOLVED".to_string()));
            match entry {
                Ok(html) => Ok(Box::new(StaticPage(Some(html)))),
                Err(message) => Err(AppError::browser(message)),
            }
        }

        async fn download_bytes(
            &self,
            _url: &str,
            _timeout: Duration,
            _proxy: Option<&ProxyEndpoint>,
        ) -> Result<Vec<u8>> {
            Err(AppError::browser("no downloads"))
        }
    }

    #[async_trait]
    impl PageSession for StaticPage {
        fn is_pdf(&self) -> bool {
            false
        }

        async fn perform(&mut self, _action: &HumanAction) -> Result<()> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.0.clone().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<()> {
            self.0 = None;
            Ok(())
        }
    }

    fn paragraph(topic: &str) -> String {
        format!(
            "<p>These terms describe how {topic} works for every customer of the service.</p>"
        )
    }

    fn long_body(topic: &str) -> String {
        (0..8).map(|_| paragraph(topic)).collect()
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.fetch.concurrency = 4;
        config.fetch.min_text_length = 200;
        config.fetch.max_proxy_attempts = 0;
        config.fetch.backoff_base_secs = 0.0;
        config.fetch.backoff_max_secs = 0.0;
        config.fetch.jitter_secs = 0.0;
        config.fetch.retry_extract_delay_ms = 1;
        config.browser.actions = Vec::new();
        config
    }

    fn orchestrator(
        mode: RunMode,
        driver: ScriptedDriver,
        store: Arc<LocalSnapshotStore>,
    ) -> RunOrchestrator {
        RunOrchestrator::new(&test_config(), mode, Arc::new(driver), store, Vec::new())
    }

    fn orchestrator_with(
        config: &Config,
        driver: Arc<ScriptedDriver>,
        store: Arc<LocalSnapshotStore>,
    ) -> RunOrchestrator {
        RunOrchestrator::new(config, RunMode::Run, driver, store, Vec::new())
    }

    fn target(domain: &str) -> Target {
        Target::new(domain, format!("https://{domain}/terms"))
    }

    #[tokio::test]
    async fn test_first_run_is_new_and_sorted() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver::default()
            .page("https://b.com/terms", &long_body("billing"))
            .page("https://a.com/terms", &long_body("accounts"));

        let report = orchestrator(RunMode::Run, driver, store.clone())
            .run(vec![target("b.com"), target("a.com")], CancellationToken::new())
            .await
            .unwrap();

        let domains: Vec<&str> = report.records.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["a.com", "b.com"]);
        assert!(report.records.iter().all(|r| r.status() == Status::New));
        assert!(store.read_current("a.com").await.unwrap().is_some());
        assert_eq!(report.summary.new, 2);
        assert!(dir.path().join("runs").exists());
    }

    #[tokio::test]
    async fn test_unchanged_then_changed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let body = long_body("accounts");
        let driver = ScriptedDriver::default()
            .page("https://a.com/terms", &body)
            .page("https://a.com/terms", &body.to_uppercase())
            .page("https://a.com/terms", &long_body("refunds and cancellations"));
        let radar = orchestrator(RunMode::Run, driver, store.clone());

        let first = radar.run(vec![target("a.com")], CancellationToken::new()).await.unwrap();
        assert_eq!(first.records[0].status(), Status::New);
        let stored = store.read_current("a.com").await.unwrap();

        let second = radar.run(vec![target("a.com")], CancellationToken::new()).await.unwrap();
        assert_eq!(second.records[0].status(), Status::Unchanged);
        assert_eq!(store.read_current("a.com").await.unwrap(), stored);

        let third = radar.run(vec![target("a.com")], CancellationToken::new()).await.unwrap();
        let record = &third.records[0];
        assert_eq!(record.status(), Status::Changed);
        let change = record.change().unwrap();
        assert!(change.change_level >= ChangeLevel::Minor);
        assert!(change.diff_html.contains(diff::TABLE_MARKER));
        assert_eq!(store.read_previous("a.com").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_quality_gate_blocks_first_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver::default()
            .page("https://a.com/terms", &paragraph("short"))
            .page("https://a.com/terms", &paragraph("short"));

        let report = orchestrator(RunMode::Init, driver, store.clone())
            .run(vec![target("a.com")], CancellationToken::new())
            .await
            .unwrap();

        let failure = report.records[0].failure().unwrap();
        assert_eq!(failure.error_code, ErrorCode::ShortContent);
        assert_eq!(store.read_current("a.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_init_mode_always_reports_new() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        store.write_and_rotate("a.com", "older baseline").await.unwrap();
        let driver = ScriptedDriver::default().page("https://a.com/terms", &long_body("accounts"));

        let report = orchestrator(RunMode::Init, driver, store.clone())
            .run(vec![target("a.com")], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records[0].status(), Status::New);
        assert_eq!(
            store.read_previous("a.com").await.unwrap().as_deref(),
            Some("older baseline")
        );
    }

    #[tokio::test]
    async fn test_retry_pass_replaces_failure() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver::default()
            .failure("https://a.com/terms", "net::ERR_CONNECTION_RESET")
            .page("https://a.com/terms", &long_body("accounts"))
            .failure("https://b.com/terms", "net::ERR_CONNECTION_RESET")
            .failure("https://b.com/terms", "Navigation timed out");

        let report = orchestrator(RunMode::Run, driver, store.clone())
            .run(vec![target("a.com"), target("b.com")], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records[0].status(), Status::New);
        let failure = report.records[1].failure().unwrap();
        assert_eq!(failure.error_code, ErrorCode::Timeout);
        assert_eq!(
            store.read_failed_urls().await.unwrap(),
            vec!["https://b.com/terms"]
        );
    }

    #[tokio::test]
    async fn test_concurrency_limit_caps_open_pages() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let domains = ["a.com", "b.com", "c.com", "d.com", "e.com", "f.com"];
        let mut driver = ScriptedDriver {
            open_delay: Some(Duration::from_millis(20)),
            ..ScriptedDriver::default()
        };
        for domain in domains {
            driver = driver.page(&format!("https://{domain}/terms"), &long_body(domain));
        }
        let driver = Arc::new(driver);
        let mut config = test_config();
        config.fetch.concurrency = 2;

        let report = orchestrator_with(&config, driver.clone(), store)
            .run(domains.iter().map(|d| target(d)).collect(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.summary.new, domains.len());
        assert_eq!(driver.peak_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_domain_is_retried_exactly_once() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = Arc::new(
            ScriptedDriver::default().page("https://a.com/terms", &long_body("accounts")),
        );

        let report = orchestrator_with(&test_config(), driver.clone(), store)
            .run(vec![target("a.com"), target("b.com")], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records[1].failure().unwrap().error_code, ErrorCode::Network);
        assert_eq!(driver.open_count("https://a.com/terms"), 1);
        assert_eq!(driver.open_count("https://b.com/terms"), 2);
    }

    #[tokio::test]
    async fn test_storage_failure_is_unknown() {
        let dir = TempDir::new().unwrap();
        // A regular file where the state directory should be.
        std::fs::write(dir.path().join("state"), "").unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver::default()
            .page("https://a.com/terms", &long_body("accounts"))
            .page("https://a.com/terms", &long_body("accounts"));

        let report = orchestrator(RunMode::Init, driver, store)
            .run(vec![target("a.com")], CancellationToken::new())
            .await
            .unwrap();

        let failure = report.records[0].failure().unwrap();
        assert_eq!(failure.error_code, ErrorCode::Unknown);
    }

    #[tokio::test]
    async fn test_panicking_target_is_isolated() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver {
            panic_on: Some("https://bad.com/terms".into()),
            ..ScriptedDriver::default()
        }
        .page("https://good.com/terms", &long_body("accounts"));

        let report = orchestrator(RunMode::Run, driver, store)
            .run(vec![target("bad.com"), target("good.com")], CancellationToken::new())
            .await
            .unwrap();

        let failure = report.records[0].failure().unwrap();
        assert_eq!(failure.error_code, ErrorCode::Unknown);
        assert!(failure.error_message.contains("driver defect"));
        assert_eq!(report.records[1].status(), Status::New);
    }

    #[tokio::test]
    async fn test_rerun_failed_replays_ledger() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        store
            .write_failed_urls(&["https://b.com/terms".to_string()])
            .await
            .unwrap();
        let driver = ScriptedDriver::default().page("https://b.com/terms", &long_body("billing"));

        let report = orchestrator(RunMode::RerunFailed, driver, store.clone())
            .rerun_failed(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].domain, "b.com");
        assert!(store.read_failed_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_with_empty_ledger_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));

        let report = orchestrator(RunMode::RerunFailed, ScriptedDriver::default(), store)
            .rerun_failed(CancellationToken::new())
            .await
            .unwrap();

        assert!(report.records.is_empty());
        assert!(!dir.path().join("runs").exists());
    }

    #[tokio::test]
    async fn test_empty_target_list_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let err = orchestrator(RunMode::Run, ScriptedDriver::default(), store)
            .run(Vec::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalSnapshotStore::new(dir.path()));
        let driver = ScriptedDriver::default().page("https://a.com/terms", &long_body("accounts"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator(RunMode::Run, driver, store)
            .run(vec![target("a.com")], cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert!(!dir.path().join("last_failed_urls.txt").exists());
        assert!(!dir.path().join("runs").exists());
    }
}
