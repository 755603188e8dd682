//! Content fetching with proxy failover.
//!
//! One target is tried direct first and then through the first few proxies.
//! Every attempt runs under a hard deadline, failures are reclassified into
//! the error taxonomy and the next attempt waits out an exponential backoff
//! with jitter. The outcome of the last attempt is returned when all fail.

use std::sync::Arc;
use std::time::Duration;

use log::Level;
use rand::Rng;

use super::browser::{BrowserDriver, PageSession};
use super::{extract, pdf, reclassify};
use crate::error::{AppError, Result};
use crate::models::{
    BrowserConfig, ErrorCode, FetchConfig, FetchOutcome, HumanAction, ProxyEndpoint, SourceKind,
    Target,
};
use crate::utils::log::RunLogger;
use crate::utils::url::looks_like_pdf;

/// Slack on top of the navigation timeout before an attempt is abandoned.
pub const HARD_TIMEOUT_GRACE: Duration = Duration::from_secs(20);

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_secs: f64,
    pub max_secs: f64,
    pub jitter_secs: f64,
}

impl Backoff {
    /// `min(max, base * 2^(attempt_index - 1))`, without jitter.
    pub fn base_delay_secs(&self, attempt_index: usize) -> f64 {
        let exponent = attempt_index.saturating_sub(1).min(30) as i32;
        (self.base_secs * 2f64.powi(exponent)).min(self.max_secs)
    }

    /// Delay before the attempt following `attempt_index`, jitter included.
    pub fn delay(&self, attempt_index: usize) -> Duration {
        let jitter = if self.jitter_secs > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter_secs)
        } else {
            0.0
        };
        Duration::from_secs_f64((self.base_delay_secs(attempt_index) + jitter).max(0.0))
    }
}

/// Attempt plan: direct first, then the first `max_proxy_attempts` proxies.
pub fn build_attempts(
    proxies: &[ProxyEndpoint],
    max_proxy_attempts: usize,
) -> Vec<Option<&ProxyEndpoint>> {
    std::iter::once(None)
        .chain(proxies.iter().take(max_proxy_attempts).map(Some))
        .collect()
}

/// Fetcher settings derived from the loaded configuration.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_proxy_attempts: usize,
    pub backoff: Backoff,
    pub retry_extract_delay: Duration,
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_proxy_attempts: config.max_proxy_attempts,
            backoff: Backoff {
                base_secs: config.backoff_base_secs,
                max_secs: config.backoff_max_secs,
                jitter_secs: config.jitter_secs,
            },
            retry_extract_delay: config.retry_extract_delay(),
        }
    }
}

enum PageRead {
    Text(String),
    Pdf,
}

/// Acquires the readable text of one target.
pub struct ContentFetcher {
    driver: Arc<dyn BrowserDriver>,
    profile: BrowserConfig,
    settings: FetchSettings,
    logger: RunLogger,
}

impl ContentFetcher {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        profile: BrowserConfig,
        settings: FetchSettings,
        logger: RunLogger,
    ) -> Self {
        Self {
            driver,
            profile,
            settings,
            logger,
        }
    }

    /// Run the attempt plan for `target`. Never returns an error: failures
    /// are reported through the outcome.
    pub async fn fetch(&self, target: &Target, proxies: &[ProxyEndpoint]) -> FetchOutcome {
        let attempts = build_attempts(proxies, self.settings.max_proxy_attempts);
        let total = attempts.len();
        let hard_timeout = self.settings.timeout + HARD_TIMEOUT_GRACE;
        let mut last_failure = None;

        for (index, proxy) in attempts.into_iter().enumerate() {
            let attempt = index + 1;
            if index > 0 {
                let delay = self.settings.backoff.delay(index);
                self.logger.debug(&format!(
                    "{}: waiting {:.2}s before attempt {attempt}/{total}",
                    target.domain,
                    delay.as_secs_f64()
                ));
                tokio::time::sleep(delay).await;
            }

            let proxy_label = proxy.map(ToString::to_string);
            let result = match tokio::time::timeout(hard_timeout, self.attempt(target, proxy)).await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::fetch(
                    ErrorCode::Timeout,
                    format!("Attempt exceeded hard timeout of {}s", hard_timeout.as_secs()),
                )),
            };

            match result {
                Ok((text, source_kind)) => {
                    self.logger.event(
                        Level::Debug,
                        "FETCHED",
                        &[
                            ("domain", &target.domain),
                            ("attempt", &format!("{attempt}/{total}")),
                            ("proxy", &proxy_label.as_deref().unwrap_or("direct")),
                            ("source", &source_kind),
                        ],
                    );
                    return FetchOutcome::success(text, source_kind, attempt, proxy_label);
                }
                Err(err) => {
                    let code = reclassify::classify_error(&err);
                    let message = err.message();
                    self.logger.event(
                        Level::Warn,
                        "ATTEMPT_FAILED",
                        &[
                            ("domain", &target.domain),
                            ("attempt", &format!("{attempt}/{total}")),
                            ("proxy", &proxy_label.as_deref().unwrap_or("direct")),
                            ("code", &code),
                            ("error", &message),
                        ],
                    );
                    last_failure = Some(FetchOutcome::failure(code, message, attempt, proxy_label));
                }
            }
        }

        last_failure.unwrap_or_else(|| {
            FetchOutcome::failure(ErrorCode::Unknown, "No fetch attempts were made", 0, None)
        })
    }

    async fn attempt(
        &self,
        target: &Target,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<(String, SourceKind)> {
        if looks_like_pdf(&target.url) {
            let text = self.fetch_pdf(&target.url, proxy).await?;
            return Ok((text, SourceKind::Pdf));
        }

        let mut session = self
            .driver
            .open(&target.url, self.settings.timeout, proxy, &self.profile)
            .await?;
        let read = self.read_page(session.as_mut()).await;
        if let Err(e) = session.close().await {
            self.logger
                .debug(&format!("{}: closing page failed: {e}", target.domain));
        }

        match read? {
            PageRead::Text(text) => Ok((text, SourceKind::Html)),
            PageRead::Pdf => {
                let text = self.fetch_pdf(&target.url, proxy).await?;
                Ok((text, SourceKind::Pdf))
            }
        }
    }

    async fn read_page(&self, session: &mut dyn PageSession) -> Result<PageRead> {
        if session.is_pdf() {
            return Ok(PageRead::Pdf);
        }

        for action in &self.profile.actions {
            match action {
                HumanAction::Wait { min_ms, max_ms } => {
                    tokio::time::sleep(random_wait(*min_ms, *max_ms)).await
                }
                _ => session.perform(action).await?,
            }
        }

        if let Some(text) = readable_text(&session.content().await?)? {
            return Ok(PageRead::Text(text));
        }

        // Late-rendering pages get one more look.
        tokio::time::sleep(self.settings.retry_extract_delay).await;
        readable_text(&session.content().await?)?
            .map(PageRead::Text)
            .ok_or_else(|| {
                AppError::fetch(ErrorCode::EmptyContent, "No readable text on the page")
            })
    }

    async fn fetch_pdf(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> Result<String> {
        let bytes = self
            .driver
            .download_bytes(url, self.settings.timeout, proxy)
            .await
            .map_err(|e| {
                let message = e.message();
                let code = if reclassify::is_proxy_auth_failure(&message) {
                    ErrorCode::Proxy
                } else {
                    ErrorCode::PdfDownload
                };
                AppError::fetch(code, format!("PDF download failed: {message}"))
            })?;
        pdf::extract_text(bytes).await
    }
}

/// Main text of a rendered page, `None` when nothing survives cleanup.
fn readable_text(html: &str) -> Result<Option<String>> {
    let page = extract::analyze(html);
    if let Some(marker) = extract::detect_bot_block(&page.title, &page.body_text) {
        return Err(AppError::fetch(
            ErrorCode::BotDetected,
            format!("Bot check page detected ('{marker}')"),
        ));
    }
    let text = extract::strip_boilerplate(&page.main_text);
    Ok((!text.trim().is_empty()).then_some(text))
}

fn random_wait(min_ms: u64, max_ms: u64) -> Duration {
    let (low, high) = (min_ms.min(max_ms), min_ms.max(max_ms));
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::RunMode;

    const TERMS: &str = "These terms govern your use of the service and every product we offer.";

    fn terms_page() -> String {
        format!("<html><head><title>Terms</title></head><body><main><p>{TERMS}</p></main></body></html>")
    }

    /// What a fake page load does.
    #[derive(Clone)]
    enum Script {
        Fail(String),
        Hang,
        Pages(Vec<String>),
        Pdf,
    }

    struct FakeDriver {
        opens: Mutex<VecDeque<Script>>,
        download: Mutex<Option<Result<Vec<u8>>>>,
        seen_proxies: Mutex<Vec<Option<String>>>,
        actions: Arc<Mutex<Vec<HumanAction>>>,
    }

    impl FakeDriver {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                opens: Mutex::new(scripts.into()),
                download: Mutex::new(None),
                seen_proxies: Mutex::new(Vec::new()),
                actions: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_download(self, result: Result<Vec<u8>>) -> Self {
            *self.download.lock().unwrap() = Some(result);
            self
        }
    }

    struct FakeSession {
        pages: VecDeque<String>,
        pdf: bool,
        actions: Arc<Mutex<Vec<HumanAction>>>,
    }

    #[async_trait]
    impl BrowserDriver for FakeDriver {
        async fn open(
            &self,
            _url: &str,
            _timeout: Duration,
            proxy: Option<&ProxyEndpoint>,
            _profile: &BrowserConfig,
        ) -> Result<Box<dyn PageSession>> {
            self.seen_proxies
                .lock()
                .unwrap()
                .push(proxy.map(ToString::to_string));
            let script = self
                .opens
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Fail("no script".into()));
            match script {
                Script::Fail(message) => Err(AppError::browser(message)),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AppError::browser("unreachable"))
                }
                Script::Pages(pages) => Ok(Box::new(FakeSession {
                    pages: pages.into(),
                    pdf: false,
                    actions: self.actions.clone(),
                })),
                Script::Pdf => Ok(Box::new(FakeSession {
                    pages: VecDeque::new(),
                    pdf: true,
                    actions: self.actions.clone(),
                })),
            }
        }

        async fn download_bytes(
            &self,
            _url: &str,
            _timeout: Duration,
            _proxy: Option<&ProxyEndpoint>,
        ) -> Result<Vec<u8>> {
            self.download
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AppError::browser("no download scripted")))
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        fn is_pdf(&self) -> bool {
            self.pdf
        }

        async fn perform(&mut self, action: &HumanAction) -> Result<()> {
            self.actions.lock().unwrap().push(action.clone());
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.pages.pop_front().unwrap_or_default())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn settings() -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(5),
            max_proxy_attempts: 2,
            backoff: Backoff {
                base_secs: 0.0,
                max_secs: 0.0,
                jitter_secs: 0.0,
            },
            retry_extract_delay: Duration::from_millis(1),
        }
    }

    fn fetcher(driver: Arc<FakeDriver>, actions: Vec<HumanAction>) -> ContentFetcher {
        let profile = BrowserConfig {
            actions,
            ..BrowserConfig::default()
        };
        ContentFetcher::new(driver, profile, settings(), RunLogger::new("test", RunMode::Run))
    }

    fn target() -> Target {
        Target::new("example.com", "https://example.com/terms")
    }

    fn proxies() -> Vec<ProxyEndpoint> {
        vec![
            ProxyEndpoint::new("10.0.0.1", 8080),
            ProxyEndpoint::with_credentials("10.0.0.2", 3128, "user", "secret"),
            ProxyEndpoint::new("10.0.0.3", 8080),
        ]
    }

    #[test]
    fn test_build_attempts_direct_first() {
        let proxies = proxies();
        let attempts = build_attempts(&proxies, 2);
        assert_eq!(attempts.len(), 3);
        assert!(attempts[0].is_none());
        assert_eq!(attempts[1], Some(&proxies[0]));
        assert_eq!(attempts[2], Some(&proxies[1]));

        assert_eq!(build_attempts(&proxies, 10).len(), 4);
        assert_eq!(build_attempts(&[], 3).len(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = Backoff {
            base_secs: 0.8,
            max_secs: 8.0,
            jitter_secs: 0.0,
        };
        assert_eq!(backoff.base_delay_secs(1), 0.8);
        assert_eq!(backoff.base_delay_secs(2), 1.6);
        assert_eq!(backoff.base_delay_secs(3), 3.2);
        assert_eq!(backoff.base_delay_secs(5), 8.0);
        assert_eq!(backoff.base_delay_secs(40), 8.0);
        assert_eq!(backoff.delay(2), Duration::from_secs_f64(1.6));
    }

    #[test]
    fn test_backoff_small_cap() {
        let backoff = Backoff {
            base_secs: 0.5,
            max_secs: 2.0,
            jitter_secs: 0.0,
        };
        assert_eq!(backoff.base_delay_secs(1), 0.5);
        assert_eq!(backoff.base_delay_secs(2), 1.0);
        assert_eq!(backoff.base_delay_secs(3), 2.0);
        assert_eq!(backoff.base_delay_secs(4), 2.0);
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let backoff = Backoff {
            base_secs: 1.0,
            max_secs: 8.0,
            jitter_secs: 0.4,
        };
        for _ in 0..50 {
            let secs = backoff.delay(1).as_secs_f64();
            assert!((1.0..=1.4 + 1e-9).contains(&secs), "delay {secs}");
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let driver = Arc::new(FakeDriver::new(vec![Script::Pages(vec![terms_page()])]));
        let outcome = fetcher(driver.clone(), Vec::new()).fetch(&target(), &proxies()).await;

        assert!(outcome.ok);
        assert_eq!(outcome.attempt, 1);
        assert_eq!(outcome.proxy_used, None);
        assert_eq!(outcome.source_kind, SourceKind::Html);
        assert_eq!(outcome.text, TERMS);
        assert_eq!(driver.seen_proxies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fails_over_to_proxy() {
        let driver = Arc::new(FakeDriver::new(vec![
            Script::Fail("net::ERR_CONNECTION_RESET".into()),
            Script::Pages(vec![terms_page()]),
        ]));
        let outcome = fetcher(driver.clone(), Vec::new()).fetch(&target(), &proxies()).await;

        assert!(outcome.ok);
        assert_eq!(outcome.attempt, 2);
        assert_eq!(outcome.proxy_used.as_deref(), Some("10.0.0.1:8080"));
        assert_eq!(
            *driver.seen_proxies.lock().unwrap(),
            vec![None, Some("10.0.0.1:8080".to_string())]
        );
    }

    #[tokio::test]
    async fn test_all_attempts_fail_returns_last_error() {
        let driver = Arc::new(FakeDriver::new(vec![
            Script::Fail("net::ERR_CONNECTION_RESET".into()),
            Script::Fail("net::ERR_TUNNEL_CONNECTION_FAILED".into()),
            Script::Fail("Navigation timed out".into()),
        ]));
        let outcome = fetcher(driver.clone(), Vec::new()).fetch(&target(), &proxies()).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.attempt, 3);
        assert_eq!(outcome.error_code, Some(ErrorCode::Timeout));
        assert_eq!(outcome.proxy_used.as_deref(), Some("10.0.0.2:3128"));
        assert_eq!(driver.seen_proxies.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bot_page_is_classified() {
        let captcha = "<html><head><title>Just a moment...</title></head>\
                       <body><p>Checking your browser before accessing the site.</p></body></html>";
        let driver = Arc::new(FakeDriver::new(vec![Script::Pages(vec![captcha.into()])]));
        let outcome = fetcher(driver, Vec::new()).fetch(&target(), &[]).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.error_code, Some(ErrorCode::BotDetected));
    }

    #[tokio::test]
    async fn test_empty_page_retried_once_then_fails() {
        let empty = "<html><body><p>We use cookies</p></body></html>".to_string();
        let driver = Arc::new(FakeDriver::new(vec![Script::Pages(vec![
            empty.clone(),
            empty.clone(),
        ])]));
        let outcome = fetcher(driver, Vec::new()).fetch(&target(), &[]).await;
        assert_eq!(outcome.error_code, Some(ErrorCode::EmptyContent));

        let driver = Arc::new(FakeDriver::new(vec![Script::Pages(vec![empty, terms_page()])]));
        let outcome = fetcher(driver, Vec::new()).fetch(&target(), &[]).await;
        assert!(outcome.ok);
        assert_eq!(outcome.text, TERMS);
    }

    #[tokio::test]
    async fn test_pdf_response_goes_through_download() {
        let driver = Arc::new(
            FakeDriver::new(vec![Script::Pdf]).with_download(Ok(b"<html>login</html>".to_vec())),
        );
        let outcome = fetcher(driver, Vec::new()).fetch(&target(), &[]).await;
        assert_eq!(outcome.error_code, Some(ErrorCode::PdfParse));
    }

    #[tokio::test]
    async fn test_pdf_url_skips_browser() {
        let pdf_target = Target::new("example.com", "https://example.com/legal/terms.pdf");
        let driver = Arc::new(
            FakeDriver::new(vec![])
                .with_download(Err(AppError::browser("HTTP status server error (503)"))),
        );
        let outcome = fetcher(driver.clone(), Vec::new()).fetch(&pdf_target, &[]).await;

        assert_eq!(outcome.error_code, Some(ErrorCode::PdfDownload));
        assert!(driver.seen_proxies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_proxy_auth_failure_is_proxy() {
        let pdf_target = Target::new("example.com", "https://example.com/terms.pdf");
        let driver = Arc::new(FakeDriver::new(vec![]).with_download(Err(AppError::browser(
            "HTTP status client error (407 Proxy Authentication Required)",
        ))));
        let outcome = fetcher(driver, Vec::new()).fetch(&pdf_target, &[]).await;
        assert_eq!(outcome.error_code, Some(ErrorCode::Proxy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_hits_hard_timeout() {
        let driver = Arc::new(FakeDriver::new(vec![Script::Hang]));
        let outcome = fetcher(driver, Vec::new()).fetch(&target(), &[]).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.error_code, Some(ErrorCode::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_and_scroll_actions_reach_session() {
        let driver = Arc::new(FakeDriver::new(vec![Script::Pages(vec![terms_page()])]));
        let actions = vec![
            HumanAction::Wait {
                min_ms: 10,
                max_ms: 20,
            },
            HumanAction::MouseMove {
                x: 10.0,
                y: 20.0,
                steps: 3,
            },
            HumanAction::Scroll { dy: 300 },
        ];
        let outcome = fetcher(driver.clone(), actions).fetch(&target(), &[]).await;

        assert!(outcome.ok);
        let performed = driver.actions.lock().unwrap().clone();
        assert_eq!(performed.len(), 2);
        assert_eq!(performed[1], HumanAction::Scroll { dy: 300 });
    }
}
