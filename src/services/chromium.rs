//! Headless Chromium driver over the DevTools protocol.
//!
//! Each page load gets its own browser process so a proxy can be set per
//! attempt and a crashed page never affects another target.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams, EventAuthRequired, EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures::{FutureExt, StreamExt};
use rand::Rng;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::browser::{BrowserDriver, PageSession};
use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, ErrorCode, HumanAction, ProxyEndpoint};
use crate::utils::http::{create_async_client, fetch_bytes};
use crate::utils::url::is_pdf_content_type;

/// Launches one headless Chromium per page load.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    user_agent: String,
}

impl ChromiumDriver {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open(
        &self,
        url: &str,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
        profile: &BrowserConfig,
    ) -> Result<Box<dyn PageSession>> {
        let profile_dir = create_profile_dir()?;

        let mut builder = LaunchConfig::builder()
            .request_timeout(timeout)
            .window_size(profile.viewport_width, profile.viewport_height)
            .user_data_dir(profile_dir.path())
            .arg(format!("--lang={}", profile.locale))
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(executable) = &profile.executable {
            builder = builder.chrome_executable(executable);
        }
        if profile.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.server_url()));
        }
        let config = builder.build().map_err(AppError::browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::browser(format!("Chromium launch failed: {e}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            page: None,
            tasks: vec![handler_task],
            profile_dir,
            is_pdf: false,
            pointer: (0.0, 0.0),
        };
        match session.navigate(url, timeout, proxy, profile).await {
            Ok(()) => Ok(Box::new(session)),
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }

    async fn download_bytes(
        &self,
        url: &str,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Vec<u8>> {
        let client = create_async_client(&self.user_agent, timeout, proxy)?;
        fetch_bytes(&client, url).await
    }
}

/// Throwaway Chromium profile directory under the system temp dir.
fn create_profile_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("tos-radar-").tempdir()?)
}

struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    tasks: Vec<JoinHandle<()>>,
    /// Removed when the session is dropped, including mid-flight.
    profile_dir: TempDir,
    is_pdf: bool,
    pointer: (f64, f64),
}

impl ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
        profile: &BrowserConfig,
    ) -> Result<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(AppError::browser)?;

        let mut user_agent = SetUserAgentOverrideParams::new(profile.user_agent.clone());
        user_agent.accept_language = Some(profile.accept_language.clone());
        page.execute(user_agent).await.map_err(AppError::browser)?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(profile.viewport_width),
            i64::from(profile.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(AppError::browser)?;
        for script in &profile.init_scripts {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script.clone()))
                .await
                .map_err(AppError::browser)?;
        }

        if let Some((login, password)) = proxy.and_then(ProxyEndpoint::credentials) {
            self.answer_proxy_auth(&page, login, password).await?;
        }

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(AppError::browser)?;
        self.page = Some(page.clone());

        let navigation = tokio::time::timeout(timeout, page.goto(url)).await;

        // The main document response is already queued once navigation settles.
        let mut main_mime = None;
        while let Some(Some(event)) = responses.next().now_or_never() {
            if event.r#type == ResourceType::Document && main_mime.is_none() {
                main_mime = Some(event.response.mime_type.clone());
            }
        }
        self.is_pdf = main_mime.as_deref().is_some_and(is_pdf_content_type);

        match navigation {
            Err(_) => Err(AppError::fetch(
                ErrorCode::Timeout,
                format!("Page timeout after {}s", timeout.as_secs()),
            )),
            // Chromium aborts navigations that turn into PDF downloads.
            Ok(Err(_)) if self.is_pdf => Ok(()),
            Ok(Err(e)) => Err(AppError::browser(e)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    /// Answer proxy auth challenges through the Fetch domain.
    async fn answer_proxy_auth(&mut self, page: &Page, login: &str, password: &str) -> Result<()> {
        let mut challenges = page
            .event_listener::<EventAuthRequired>()
            .await
            .map_err(AppError::browser)?;
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(AppError::browser)?;
        page.execute(EnableParams {
            patterns: None,
            handle_auth_requests: Some(true),
        })
        .await
        .map_err(AppError::browser)?;

        let auth_page = page.clone();
        let credentials = AuthChallengeResponse {
            response: AuthChallengeResponseResponse::ProvideCredentials,
            username: Some(login.to_string()),
            password: Some(password.to_string()),
        };
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = challenges.next().await {
                let reply = ContinueWithAuthParams::new(event.request_id.clone(), credentials.clone());
                if let Err(e) = auth_page.execute(reply).await {
                    log::debug!("Proxy auth reply failed: {e}");
                }
            }
        }));

        let paused_page = page.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let _ = paused_page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await;
            }
        }));
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::browser("page is not open"))
    }

    async fn move_pointer(&mut self, x: f64, y: f64, steps: u32) -> Result<()> {
        let page = self.page()?.clone();
        let (from_x, from_y) = self.pointer;
        let steps = steps.max(1);
        for step in 1..=steps {
            let t = f64::from(step) / f64::from(steps);
            let params = DispatchMouseEventParams::new(
                DispatchMouseEventType::MouseMoved,
                from_x + (x - from_x) * t,
                from_y + (y - from_y) * t,
            );
            page.execute(params).await.map_err(AppError::browser)?;
            let pause = rand::thread_rng().gen_range(8..=25);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
        self.pointer = (x, y);
        Ok(())
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    fn is_pdf(&self) -> bool {
        self.is_pdf
    }

    async fn perform(&mut self, action: &HumanAction) -> Result<()> {
        match action {
            HumanAction::MouseMove { x, y, steps } => self.move_pointer(*x, *y, *steps).await,
            HumanAction::Scroll { dy } => {
                self.page()?
                    .evaluate(format!("window.scrollBy(0, {dy})"))
                    .await
                    .map_err(AppError::browser)?;
                Ok(())
            }
            HumanAction::Wait { min_ms, max_ms } => {
                let pause = rand::thread_rng().gen_range(*min_ms.min(max_ms)..=*min_ms.max(max_ms));
                tokio::time::sleep(Duration::from_millis(pause)).await;
                Ok(())
            }
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?.content().await.map_err(AppError::browser)
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        let closed = self.browser.close().await.map_err(AppError::browser);
        let _ = self.browser.wait().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
