// src/config.rs

//! Configuration and target registry loading.
//!
//! The registry is two plain-text files: one absolute URL per line for
//! targets and `host:port[:login:password]` per line for proxies. Blank
//! lines and `#` comments are ignored in both.

use std::collections::HashSet;
use std::path::Path;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, ProxyEndpoint, Target};
use crate::utils::url::domain_key;

/// Load the config file, apply environment overrides and validate.
///
/// A missing or unreadable file falls back to defaults; bad overrides and
/// failed validation are errors.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Load config, targets and proxies in one go.
pub fn load_all(path: &Path) -> Result<(Config, Vec<Target>, Vec<ProxyEndpoint>)> {
    let config = load_config(path)?;
    let targets = load_targets(&config.paths.targets_file)?;
    let proxies = load_proxies(&config.paths.proxies_file)?;
    Ok((config, targets, proxies))
}

/// Read the targets file. A missing file yields no targets.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    match read_optional(path)? {
        Some(text) => parse_targets(&path.display().to_string(), &text),
        None => {
            log::warn!("Targets file not found: {}", path.display());
            Ok(Vec::new())
        }
    }
}

/// Parse target lines. Every URL must be absolute http(s) and every domain
/// unique.
pub fn parse_targets(source_name: &str, text: &str) -> Result<Vec<Target>> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for (index, line) in registry_lines(text) {
        let domain = target_domain(line).ok_or_else(|| {
            AppError::config(format!("Invalid URL in {source_name}:{index}: {line}"))
        })?;
        if !seen.insert(domain.clone()) {
            return Err(AppError::config(format!(
                "Duplicate domain in {source_name}:{index}: {domain}"
            )));
        }
        targets.push(Target::new(domain, line));
    }
    Ok(targets)
}

/// Targets for replaying ledger URLs. Invalid lines are skipped and repeated
/// domains keep their first URL.
pub fn targets_from_urls(urls: &[String]) -> Vec<Target> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for url in urls {
        let url = url.trim();
        let Some(domain) = target_domain(url) else {
            log::warn!("Skipping invalid ledger URL: {url}");
            continue;
        };
        if seen.insert(domain.clone()) {
            targets.push(Target::new(domain, url));
        }
    }
    targets
}

/// Read the proxies file. A missing file means direct attempts only.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyEndpoint>> {
    match read_optional(path)? {
        Some(text) => parse_proxies(&path.display().to_string(), &text),
        None => {
            log::debug!("Proxies file not found: {}", path.display());
            Ok(Vec::new())
        }
    }
}

/// Parse `host:port` and `host:port:login:password` lines.
pub fn parse_proxies(source_name: &str, text: &str) -> Result<Vec<ProxyEndpoint>> {
    registry_lines(text)
        .map(|(index, line)| {
            parse_proxy(line).ok_or_else(|| {
                AppError::config(format!(
                    "Invalid proxy in {source_name}:{index}: expected host:port or \
                     host:port:login:password"
                ))
            })
        })
        .collect()
}

fn parse_proxy(line: &str) -> Option<ProxyEndpoint> {
    let parts: Vec<&str> = line.split(':').collect();
    let (host, port) = match parts.as_slice() {
        [host, port] | [host, port, _, _] => (host.trim(), port.trim().parse::<u16>().ok()?),
        _ => return None,
    };
    if host.is_empty() || port == 0 {
        return None;
    }
    match parts.as_slice() {
        [_, _, login, password] if !login.is_empty() => {
            Some(ProxyEndpoint::with_credentials(host, port, *login, *password))
        }
        [_, _] => Some(ProxyEndpoint::new(host, port)),
        _ => None,
    }
}

fn target_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    domain_key(url)
}

/// Non-blank, non-comment lines with their 1-based line numbers.
fn registry_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}
