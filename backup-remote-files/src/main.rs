//! Backup Remote Files - Main entry point
//!
//! Retrieves the configured files, then keeps them fresh on a schedule while
//! serving the outcome on `/metrics`.

use anyhow::{Context, Result};
use backup_remote_files::daemon::shutdown::ShutdownCoordinator;
use backup_remote_files::fetch::HttpFetcher;
use backup_remote_files::metrics::PrometheusMetrics;
use backup_remote_files::retrieval::RetrievalState;
use backup_remote_files::scheduler::Scheduler;
use backup_remote_files::{api, utils, BuildInfo, Config};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_PORT: u16 = 9289;

#[derive(Parser, Debug)]
#[command(author, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", required_unless_present = "version")]
    config: Option<PathBuf>,

    /// Exporter port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error), overrides config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Show version info
    #[arg(short = 'V', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let build = BuildInfo::current();

    if args.version {
        print!("{}", build);
        return Ok(());
    }

    let config_path = args
        .config
        .context("missing required --config argument")?;
    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting backup-remote-files v{}", build.version);
    tracing::info!(
        interval = ?config.interval,
        retry_interval = ?config.retry_interval,
        metrics_prefix = %config.metrics_prefix,
        fetch_timeout = ?config.fetch_timeout,
        "Configuration loaded"
    );
    for backup in &config.backups {
        tracing::info!(id = %backup.id, url = %backup.url, "Tracking remote file");
    }
    if config.backups.is_empty() {
        tracing::warn!("No backups configured, only build info will be exported");
    }

    let metrics = Arc::new(PrometheusMetrics::new(&config.metrics_prefix)?);
    metrics.initialize(&build, config.backups.iter().map(|b| b.id.as_str()));

    let fetcher = HttpFetcher::new(config.fetch_timeout).context("Failed to build HTTP client")?;
    let retrieval = RetrievalState::new(fetcher, metrics.clone());
    let mut scheduler = Scheduler::new(
        retrieval,
        config.items(),
        config.interval,
        config.retry_interval,
    );

    // Signals are handled from here on, so one arriving during the first
    // sweep waits for it instead of killing the process.
    let shutdown = ShutdownCoordinator::new();
    let signal = shutdown.clone();
    tokio::spawn(async move { signal.wait_for_signal().await });

    // First retrieval happens before anything is served
    scheduler.start().await;

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.token()));

    let app = api::create_router(api::AppState {
        metrics: metrics.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not start exporter HTTP server on {}", addr))?;
    tracing::info!(port = args.port, "Starting exporter HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.token().cancelled_owned())
        .await
        .context("Exporter HTTP server failed")?;

    // The server may also stop on its own; make sure the scheduler follows.
    shutdown.trigger();
    shutdown.join("Scheduler", scheduler_handle).await;

    tracing::info!("Exporter stopped");
    Ok(())
}
