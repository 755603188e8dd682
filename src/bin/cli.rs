//! tos-radar CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tos_radar::{
    config,
    error::{AppError, Result},
    models::{Config, RunMode},
    pipeline::{self, RunOrchestrator},
    services::ChromiumDriver,
    storage::{LocalSnapshotStore, RunReport, SnapshotStore},
};

/// tos-radar - Terms of Service change monitor
#[derive(Parser, Debug)]
#[command(
    name = "tos-radar",
    version,
    about = "Watches legal documents for meaningful content changes"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every target and store baseline snapshots
    Init,

    /// Fetch every target and compare against stored snapshots
    Run,

    /// Replay only the URLs that failed in the last run
    RerunFailed,

    /// Validate configuration, targets and proxies
    Validate,

    /// Show stored state for the configured tenant
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the run on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling run...");
            token.cancel();
        }
    });
    cancel
}

fn print_summary(orchestrator: &RunOrchestrator, report: &RunReport) {
    let logger = orchestrator.logger();
    let summary = &report.summary;
    let elapsed = summary.finished_at - summary.started_at;

    logger.summary(
        "Run complete",
        &[
            ("Total", summary.total.to_string()),
            ("New", summary.new.to_string()),
            ("Changed", summary.changed.to_string()),
            ("Unchanged", summary.unchanged.to_string()),
            ("Failed", summary.failed.to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );

    if !summary.suspicious.is_empty() {
        logger.warn("Suspicious changes (review before trusting):");
        for domain in &summary.suspicious {
            logger.sub_item(domain);
        }
    }
}

async fn execute_run(config: &Config, mode: RunMode) -> Result<()> {
    let targets = match mode {
        RunMode::RerunFailed => Vec::new(),
        RunMode::Init | RunMode::Run => config::load_targets(&config.paths.targets_file)?,
    };
    let proxies = config::load_proxies(&config.paths.proxies_file)?;
    log::info!(
        "Loaded {} targets and {} proxies",
        targets.len(),
        proxies.len()
    );

    let driver = Arc::new(ChromiumDriver::new(config.browser.user_agent.clone()));
    let store = Arc::new(LocalSnapshotStore::new(config.tenant_dir()));
    let orchestrator = RunOrchestrator::new(config, mode, driver, store, proxies);
    let cancel = cancel_on_interrupt();

    let report = match mode {
        RunMode::RerunFailed => orchestrator.rerun_failed(cancel).await?,
        RunMode::Init | RunMode::Run => orchestrator.run(targets, cancel).await?,
    };
    print_summary(&orchestrator, &report);
    Ok(())
}

async fn show_info(config: &Config) -> Result<()> {
    let store = LocalSnapshotStore::new(config.tenant_dir());
    log::info!("Tenant: {}", config.tenant);
    log::info!("Data directory: {}", store.root_dir().display());

    let snapshots = match std::fs::read_dir(store.root_dir().join("state")) {
        Ok(entries) => entries.filter_map(|e| e.ok()).count(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(AppError::Io(e)),
    };
    log::info!("Domains with snapshots: {snapshots}");

    let failed = store.read_failed_urls().await?;
    log::info!("URLs in failed ledger: {}", failed.len());
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = config::load_config(&cli.config);
    let level = loaded
        .as_ref()
        .map_or_else(|_| "info".to_string(), |c| c.logging.level.clone());
    init_logging(cli.verbose, &level);

    if !cli.config.exists() {
        log::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }
    let config = loaded.inspect_err(|e| log::error!("{e}"))?;

    match cli.command {
        Command::Init => execute_run(&config, RunMode::Init).await?,
        Command::Run => execute_run(&config, RunMode::Run).await?,
        Command::RerunFailed => execute_run(&config, RunMode::RerunFailed).await?,
        Command::Validate => {
            let report = pipeline::run_validate(&cli.config)?;
            log::info!(
                "All validations passed ({} targets, {} proxies)",
                report.targets,
                report.proxies
            );
        }
        Command::Info => show_info(&config).await?,
    }

    log::info!("Done!");

    Ok(())
}
