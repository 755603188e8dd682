// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::{AppError, Result};

/// Counts reported by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub tenant: String,
    pub targets: usize,
    pub proxies: usize,
}

/// Validate configuration, targets and proxies without fetching anything.
pub fn run_validate(config_path: &Path) -> Result<ValidationReport> {
    log::info!("Validating configuration from {}", config_path.display());

    match load_all(config_path) {
        Ok((config, targets, proxies)) => {
            if targets.is_empty() {
                let err = AppError::config(format!(
                    "No targets configured in {}",
                    config.paths.targets_file.display()
                ));
                log::error!("Validation failed: {err}");
                return Err(err);
            }
            log::info!("Configuration is valid");
            log::info!("    Tenant: {}", config.tenant);
            log::info!("    Concurrency: {}", config.fetch.concurrency);
            log::info!("    Timeout: {}s", config.fetch.timeout_secs);
            log::info!("    Targets: {}", targets.len());
            log::info!("    Proxies: {}", proxies.len());
            Ok(ValidationReport {
                tenant: config.tenant,
                targets: targets.len(),
                proxies: proxies.len(),
            })
        }
        Err(e) => {
            log::error!("Validation failed: {e}");
            Err(e)
        }
    }
}
