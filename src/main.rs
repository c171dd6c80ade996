use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use fisis_watch::clock::SystemClock;
use fisis_watch::config::{Config, LoggingConfig};
use fisis_watch::fisis::FisisClient;
use fisis_watch::keepalive;
use fisis_watch::monitor::Monitor;
use fisis_watch::notify::NtfyNotifier;
use fisis_watch::watermark::{WatermarkError, WatermarkStore};

const DEFAULT_CONFIG: &str = "fisis-watch.toml";

#[derive(Debug, Parser)]
#[command(name = "fisis-watch", version, about = "Alert on newly published FISIS quarterly statistics")]
struct Cli {
    /// Config file; defaults are used when it does not exist.
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check for new quarters, alert, and advance the watermark (default).
    Run,
    /// Idle with a periodic heartbeat instead of monitoring.
    KeepAlive {
        /// Stop after this many seconds (overrides keep_alive.max_duration_secs).
        #[arg(long)]
        max_secs: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::from_env().context("invalid environment configuration")?
    };

    init_logging(&config.logging);
    info!("fisis-watch v{} starting", env!("CARGO_PKG_VERSION"));
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "no config file found, using env-only config");
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_monitor(&config).await,
        Command::KeepAlive { max_secs } => {
            keepalive::run_from_config(&config.keep_alive, max_secs).await;
            Ok(())
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}

async fn run_monitor(config: &Config) -> Result<()> {
    if !config.fisis.has_api_key() {
        warn!("FISIS_API_KEY is not set. Every month will be reported as a config failure");
    }

    let store = WatermarkStore::from_config(&config.watermark);
    let _lock = match store.lock() {
        Ok(lock) => Some(lock),
        Err(WatermarkError::Locked(path)) => {
            warn!(lock = %path.display(), "another run is in progress, skipping");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "could not take run lock, continuing without it");
            None
        }
    };

    let clock = SystemClock::from_config(&config.clock)
        .context("clock.utc_offset_hours is out of range")?;
    let source = FisisClient::new(config.fisis.clone())?;
    let sink = NtfyNotifier::new(config.ntfy.clone(), config.fisis.value_field.clone())
        .context("failed to build ntfy client")?;

    let report = Monitor::new(source, sink, clock, store).run().await;

    let found: Vec<String> = report
        .months_with_data()
        .iter()
        .map(|m| m.to_string())
        .collect();
    info!(
        status = ?report.status,
        found = ?found,
        watermark_file = %config.watermark.path.display(),
        "run finished"
    );
    Ok(())
}
