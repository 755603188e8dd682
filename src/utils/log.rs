// src/utils/log.rs

//! Run-scoped logging handle with server-style formatting.
//!
//! A [`RunLogger`] is built once per run and passed to every component, so
//! each line carries the tenant and run it belongs to without any
//! process-wide state. Lines are emitted through the `log` facade.

use std::fmt::{self, Display};
use std::sync::Arc;

use chrono::Utc;
use log::Level;

use crate::models::RunMode;

const TARGET: &str = "tos_radar::run";

#[derive(Debug)]
struct RunContext {
    tenant: String,
    mode: RunMode,
    run_id: String,
}

/// Cheap-to-clone logging handle for one run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    ctx: Arc<RunContext>,
}

impl RunLogger {
    pub fn new(tenant: &str, mode: RunMode) -> Self {
        Self {
            ctx: Arc::new(RunContext {
                tenant: tenant.to_string(),
                mode,
                run_id: Utc::now().format("%Y%m%d-%H%M%S").to_string(),
            }),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.ctx.tenant
    }

    pub fn mode(&self) -> RunMode {
        self.ctx.mode
    }

    /// Timestamp-based identifier shared by every line of the run.
    pub fn run_id(&self) -> &str {
        &self.ctx.run_id
    }

    fn emit(&self, level: Level, message: &str) {
        log::log!(
            target: TARGET,
            level,
            "[{}/{}] {}",
            self.ctx.tenant,
            self.ctx.mode,
            message
        );
    }

    /// Log a debug message
    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    /// Log an info message
    pub fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    /// Log an error message
    pub fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    /// Log a `EVENT key=value ...` line.
    pub fn event(&self, level: Level, event: &str, fields: &[(&str, &dyn Display)]) {
        self.emit(level, &format_event(event, fields));
    }

    /// Log a step in a process
    pub fn step(&self, step_num: usize, total: usize, message: &str) {
        self.info(&format!("[STEP {}/{}] {}", step_num, total, message));
    }

    /// Log a header
    pub fn header(&self, title: &str) {
        let border = "═".repeat(60);
        self.info(&border);
        self.info(&format!("  {}", title));
        self.info(&border);
    }

    /// Log a sub-item (indented)
    pub fn sub_item(&self, message: &str) {
        self.info(&format!("    {}", message));
    }

    /// Log a summary section
    pub fn summary(&self, title: &str, items: &[(&str, String)]) {
        self.info(&format!("[SUMMARY] {}", title));
        for (key, value) in items {
            self.info(&format!("    {}: {}", key, value));
        }
    }
}

/// Format an event name followed by `key=value` pairs.
pub fn format_event(event: &str, fields: &[(&str, &dyn Display)]) -> String {
    let mut line = String::from(event);
    for (key, value) in fields {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&quote_if_needed(value));
    }
    line
}

fn quote_if_needed(value: &dyn Display) -> String {
    let raw = value.to_string();
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        format!("{:?}", raw)
    } else {
        raw
    }
}

impl Display for RunLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.ctx.tenant, self.ctx.mode, self.ctx.run_id)
    }
}
