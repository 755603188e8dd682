//! Service layer for document acquisition.
//!
//! - Browser capability (`BrowserDriver`, `PageSession`)
//! - Readable text extraction from rendered HTML
//! - PDF text extraction
//! - Attempt/failover fetching (`ContentFetcher`)

pub mod browser;
#[cfg(feature = "browser")]
mod chromium;
pub mod extract;
pub mod fetcher;
pub mod pdf;
pub mod reclassify;

pub use browser::{BrowserDriver, PageSession};
#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use fetcher::{Backoff, ContentFetcher, FetchSettings, build_attempts};
