//! Browser automation capability.
//!
//! The fetcher only talks to these traits. Evasion (user agent, locale,
//! viewport, init scripts) and human simulation are data taken from
//! [`BrowserConfig`], so drivers stay swappable and the fetcher can be
//! exercised with an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BrowserConfig, HumanAction, ProxyEndpoint};

/// Something that can render pages and download raw documents.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` with the given evasion profile applied.
    ///
    /// The returned session stays on that page load until closed.
    async fn open(
        &self,
        url: &str,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
        profile: &BrowserConfig,
    ) -> Result<Box<dyn PageSession>>;

    /// Download a document as raw bytes.
    async fn download_bytes(
        &self,
        url: &str,
        timeout: Duration,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Vec<u8>>;
}

/// One live page load.
#[async_trait]
pub trait PageSession: Send {
    /// Whether the main response was served as a PDF.
    fn is_pdf(&self) -> bool;

    /// Perform a pointer or scroll action. Waits are handled by the caller.
    async fn perform(&mut self, action: &HumanAction) -> Result<()>;

    /// Current rendered HTML of the page.
    async fn content(&mut self) -> Result<String>;

    /// Release the page and everything behind it.
    async fn close(&mut self) -> Result<()>;
}
