//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tenant whose snapshots and ledger this run reads and writes
    #[serde(default = "defaults::tenant")]
    pub tenant: String,

    /// Input files and the data directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Fetching, retry and quality settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Browser evasion profile
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Log settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `TENANT_ID`, `CONCURRENCY`, ... environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("TENANT_ID") {
            self.tenant = v;
        }
        if let Some(v) = lookup("TOS_URLS_FILE") {
            self.paths.targets_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("PROXIES_FILE") {
            self.paths.proxies_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }

        override_parsed(&lookup, "CONCURRENCY", &mut self.fetch.concurrency)?;
        override_parsed(&lookup, "TIMEOUT_SEC", &mut self.fetch.timeout_secs)?;
        override_parsed(&lookup, "RETRY_PROXY_COUNT", &mut self.fetch.max_proxy_attempts)?;
        override_parsed(&lookup, "RETRY_BACKOFF_BASE_SEC", &mut self.fetch.backoff_base_secs)?;
        override_parsed(&lookup, "RETRY_BACKOFF_MAX_SEC", &mut self.fetch.backoff_max_secs)?;
        override_parsed(&lookup, "RETRY_JITTER_SEC", &mut self.fetch.jitter_secs)?;
        override_parsed(&lookup, "MIN_TEXT_LENGTH", &mut self.fetch.min_text_length)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let tenant = self.tenant.trim();
        if tenant.is_empty() {
            return Err(AppError::validation("tenant is empty"));
        }
        if tenant.contains(['/', '\\']) || tenant.starts_with('.') {
            return Err(AppError::validation(format!(
                "tenant '{tenant}' is not a safe directory name"
            )));
        }
        if self.fetch.concurrency == 0 {
            return Err(AppError::validation("fetch.concurrency must be > 0"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if !(self.fetch.backoff_base_secs >= 0.0) {
            return Err(AppError::validation("fetch.backoff_base_secs must be >= 0"));
        }
        if !(self.fetch.backoff_max_secs >= self.fetch.backoff_base_secs) {
            return Err(AppError::validation(
                "fetch.backoff_max_secs must be >= fetch.backoff_base_secs",
            ));
        }
        if !(self.fetch.jitter_secs >= 0.0) {
            return Err(AppError::validation("fetch.jitter_secs must be >= 0"));
        }
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::validation("browser.user_agent is empty"));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(AppError::validation("browser viewport must be non-zero"));
        }
        Ok(())
    }

    /// Directory holding everything owned by the configured tenant.
    pub fn tenant_dir(&self) -> PathBuf {
        self.paths.data_dir.join(&self.tenant)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant: defaults::tenant(),
            paths: PathsConfig::default(),
            fetch: FetchConfig::default(),
            browser: BrowserConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<()> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{key} has an invalid value: {raw}")))?;
    }
    Ok(())
}

/// Input files and storage root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Newline-delimited list of watched URLs
    #[serde(default = "defaults::targets_file")]
    pub targets_file: PathBuf,

    /// Newline-delimited list of proxies
    #[serde(default = "defaults::proxies_file")]
    pub proxies_file: PathBuf,

    /// Root for snapshots, ledgers and run output
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            targets_file: defaults::targets_file(),
            proxies_file: defaults::proxies_file(),
            data_dir: defaults::data_dir(),
        }
    }
}

/// Fetching, retry and quality settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum targets processed at once
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Per-attempt page/download timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// How many proxies to try after the direct attempt
    #[serde(default = "defaults::max_proxy_attempts")]
    pub max_proxy_attempts: usize,

    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_secs: f64,

    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_secs: f64,

    #[serde(default = "defaults::jitter")]
    pub jitter_secs: f64,

    /// Minimum length of accepted HTML text, in characters
    #[serde(default = "defaults::min_text_length")]
    pub min_text_length: usize,

    /// Pause before the second extraction when the first one came back empty
    #[serde(default = "defaults::retry_extract_delay")]
    pub retry_extract_delay_ms: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_extract_delay(&self) -> Duration {
        Duration::from_millis(self.retry_extract_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::concurrency(),
            timeout_secs: defaults::timeout(),
            max_proxy_attempts: defaults::max_proxy_attempts(),
            backoff_base_secs: defaults::backoff_base(),
            backoff_max_secs: defaults::backoff_max(),
            jitter_secs: defaults::jitter(),
            min_text_length: defaults::min_text_length(),
            retry_extract_delay_ms: defaults::retry_extract_delay(),
        }
    }
}

/// One step of the human-simulation sequence run after navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HumanAction {
    /// Sleep for a random duration in `min_ms..=max_ms`
    Wait { min_ms: u64, max_ms: u64 },
    /// Move the pointer to `(x, y)` in `steps` increments
    MouseMove { x: f64, y: f64, steps: u32 },
    /// Scroll the window vertically
    Scroll { dy: i64 },
}

/// Browser evasion profile. All of it is data handed to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::locale")]
    pub locale: String,

    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    #[serde(default = "defaults::viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "defaults::viewport_height")]
    pub viewport_height: u32,

    /// Scripts evaluated before any page script on every navigation
    #[serde(default = "defaults::init_scripts")]
    pub init_scripts: Vec<String>,

    /// Human-simulation steps performed after navigation
    #[serde(default = "defaults::actions")]
    pub actions: Vec<HumanAction>,

    /// Chromium binary; auto-detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default)]
    pub no_sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            locale: defaults::locale(),
            accept_language: defaults::accept_language(),
            viewport_width: defaults::viewport_width(),
            viewport_height: defaults::viewport_height(),
            init_scripts: defaults::init_scripts(),
            actions: defaults::actions(),
            executable: None,
            no_sandbox: false,
        }
    }
}

/// Log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::HumanAction;

    pub fn tenant() -> String {
        "default".into()
    }

    // Path defaults
    pub fn targets_file() -> PathBuf {
        PathBuf::from("config/tos_urls.txt")
    }
    pub fn proxies_file() -> PathBuf {
        PathBuf::from("config/proxies.txt")
    }
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    // Fetch defaults
    pub fn concurrency() -> usize {
        20
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn max_proxy_attempts() -> usize {
        3
    }
    pub fn backoff_base() -> f64 {
        0.8
    }
    pub fn backoff_max() -> f64 {
        8.0
    }
    pub fn jitter() -> f64 {
        0.4
    }
    pub fn min_text_length() -> usize {
        350
    }
    pub fn retry_extract_delay() -> u64 {
        1500
    }

    // Browser defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            .into()
    }
    pub fn locale() -> String {
        "en-US".into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9,ru;q=0.8".into()
    }
    pub fn viewport_width() -> u32 {
        1366
    }
    pub fn viewport_height() -> u32 {
        768
    }
    pub fn init_scripts() -> Vec<String> {
        vec![
            "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });".into(),
            "Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en', 'ru'] });"
                .into(),
            "Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });".into(),
            "window.chrome = window.chrome || { runtime: {} };".into(),
        ]
    }
    pub fn actions() -> Vec<HumanAction> {
        vec![
            HumanAction::Wait {
                min_ms: 800,
                max_ms: 1600,
            },
            HumanAction::MouseMove {
                x: 240.0,
                y: 320.0,
                steps: 8,
            },
            HumanAction::Scroll { dy: 400 },
            HumanAction::Wait {
                min_ms: 300,
                max_ms: 700,
            },
        ]
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
