//! Main entry point for the reelbot console front-end

use anyhow::Context;
use clap::Parser;
use reelbot::chat::{Bot, ConsoleTransport};
use reelbot::cli::{Args, OutputFormatter, VerbosityLevel};
use reelbot::config::BotConfig;
use reelbot::core::{DownloadQuota, Pipeline, SessionStore, DEFAULT_SESSION_CAPACITY};
use reelbot::download::{CredentialPolicy, Credentials, DownloadOrchestrator};
use reelbot::engine::YtDlpEngine;
use reelbot::stats::{JsonFileStore, UsageLedger};
use reelbot::utils::filename::{create_work_dir, sweep_stale_files};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Daily statistics buckets kept in the global document
const DAILY_STATS_RETENTION_DAYS: i64 = 30;

/// How long shutdown waits for in-flight requests
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbosity_level())?;

    info!("Starting reelbot with args: {:?}", args);
    let config = BotConfig::from_args(&args).context("invalid configuration")?;
    let formatter = OutputFormatter::new(args.verbosity_level());

    // Engine and credentials
    let sources = &config.credentials;
    let credentials = Credentials::load(
        sources.cookies_file.as_deref(),
        sources.cookies_b64.as_deref(),
        sources.cookie_header.as_deref(),
    )
    .context("failed to load credentials")?;
    let policy = Arc::new(CredentialPolicy::new(config.credential_policy, credentials));
    let engine = Arc::new(YtDlpEngine::new(config.engine_binary.clone(), config.workers));

    // Downloads live in a private subdirectory of the configured temp dir
    let work_dir = create_work_dir(&config.temp_dir)
        .with_context(|| format!("failed to create work dir in {:?}", config.temp_dir))?;
    info!(path = ?work_dir.path(), "Using work directory");
    let orchestrator = DownloadOrchestrator::new(engine.clone(), policy.clone(), work_dir.path())
        .with_max_file_size(config.max_file_size)
        .with_engine_options(config.engine_options());

    // Usage ledger
    let ledger = Arc::new(
        UsageLedger::open(
            Arc::new(JsonFileStore::new(&config.stats_file)),
            Arc::new(JsonFileStore::new(&config.profiles_file)),
        )
        .await,
    );

    let pipeline = Arc::new(
        Pipeline::new(engine, policy, orchestrator, ledger)
            .with_sessions(SessionStore::new(config.session_ttl, DEFAULT_SESSION_CAPACITY))
            .with_quota(DownloadQuota::per_hour(config.downloads_per_hour))
            .with_allowed_platforms(config.allowed_platforms.clone())
            .with_engine_options(config.engine_options()),
    );

    let maintenance = spawn_maintenance(&config, work_dir.path().to_path_buf(), pipeline.clone());

    let transport = Arc::new(ConsoleTransport::new(formatter, &config.output_dir));
    let bot = Bot::new(transport.clone(), pipeline).with_progress_interval(config.progress_interval);
    transport
        .output()
        .banner(&config.output_dir.display().to_string());

    // Console loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = transport.next_event(&mut lines) => event,
        };

        match event {
            Ok(Some(event)) => {
                in_flight.retain(|h| !h.is_finished());
                let bot = bot.clone();
                in_flight.push(tokio::spawn(async move { bot.handle(event).await }));
            }
            Ok(None) => {
                debug!("End of input");
                break;
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        }
    }

    // Shutdown
    in_flight.retain(|h| !h.is_finished());
    if !in_flight.is_empty() {
        info!(pending = in_flight.len(), "Waiting for in-flight requests");
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(in_flight)).await;
        if drained.is_err() {
            warn!("In-flight requests did not finish within {:?}", SHUTDOWN_GRACE);
        }
    }
    maintenance.abort();
    transport.output().clear_status();

    let work_path = work_dir.path().to_path_buf();
    if let Err(e) = work_dir.close() {
        warn!("Failed to remove work dir {:?}: {}", work_path, e);
    }
    info!("reelbot stopped");
    Ok(())
}

/// Periodic work dir sweep, quota pruning and daily statistics pruning
fn spawn_maintenance(config: &BotConfig, work_dir: PathBuf, pipeline: Arc<Pipeline>) -> JoinHandle<()> {
    let max_age = config.sweep_age;
    let period = config.sweep_interval.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let dir = work_dir.clone();
            match tokio::task::spawn_blocking(move || sweep_stale_files(&dir, max_age)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(removed)) => info!(removed, "Swept stale temp files"),
                Ok(Err(e)) => warn!("Temp sweep failed: {}", e),
                Err(e) => warn!("Temp sweep task failed: {}", e),
            }

            let tracked = pipeline.quota().retain_recent();
            debug!(tracked, "Quota entries after pruning");

            match pipeline.ledger().cleanup_old_daily_stats(DAILY_STATS_RETENTION_DAYS).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Pruned old daily statistics"),
                Err(e) => warn!("Daily statistics cleanup failed: {}", e),
            }
        }
    })
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    // RUST_LOG wins; otherwise follow the verbosity flags
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
