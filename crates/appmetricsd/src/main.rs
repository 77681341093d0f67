//! appmetricsd — the appmetrics daemon.
//!
//! Runs one metric poller per configured application and persists the
//! resulting instance metrics to a local redb store:
//! - Metrics store (redb)
//! - HTTP telemetry source
//! - Collector (per-app pollers, refreshed from the config file)
//! - Retention pruning
//!
//! # Usage
//!
//! ```text
//! appmetricsd run --config /etc/appmetrics/appmetrics.toml
//! ```

mod apps;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use appmetrics_collector::{
    Clock, Collector, HttpTelemetrySource, StaticCredentials, SystemClock,
};
use appmetrics_core::AppMetricsConfig;
use appmetrics_state::MetricsStore;

use crate::apps::ConfigFileApps;

#[derive(Parser)]
#[command(name = "appmetricsd", about = "appmetrics collector daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll configured applications until interrupted.
    Run {
        /// Path to appmetrics.toml.
        #[arg(long, default_value = "/etc/appmetrics/appmetrics.toml")]
        config: PathBuf,
    },
    /// Validate a config file and exit.
    CheckConfig {
        #[arg(long, default_value = "/etc/appmetrics/appmetrics.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::CheckConfig { config } => {
            let parsed = AppMetricsConfig::from_file(&config)?;
            info!(path = ?config, apps = parsed.apps.len(), "config is valid");
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,appmetricsd=debug,appmetrics_collector=debug")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = AppMetricsConfig::from_file(config_path)?;
    info!(path = ?config_path, "appmetrics daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    if let Some(parent) = config.store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = MetricsStore::open(&config.store.path)?;
    info!(path = ?config.store.path, "metrics store opened");

    let timeout = config.telemetry_timeout()?;
    let source = HttpTelemetrySource::new(config.telemetry.address.clone(), timeout);
    info!(address = %config.telemetry.address, ?timeout, "telemetry source configured");

    let credentials = StaticCredentials::new(config.resolve_token()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let poll_interval = config.poll_interval()?;
    let refresh_interval = config.refresh_interval()?;
    let collector = Arc::new(Collector::new(
        poll_interval,
        Arc::new(source),
        Arc::new(credentials),
        Arc::new(store.clone()),
        clock.clone(),
    ));

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let retention_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let directory = ConfigFileApps::new(config_path);
    let collector_task = collector.clone();
    let collector_handle = tokio::spawn(async move {
        collector_task
            .run(&directory, refresh_interval, shutdown_rx)
            .await;
    });

    let retention_handle = match config.retention()? {
        Some(retention) => Some(tokio::spawn(run_retention(
            store,
            clock,
            retention,
            refresh_interval,
            retention_shutdown,
        ))),
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Wait for background tasks.
    let _ = collector_handle.await;
    if let Some(handle) = retention_handle {
        let _ = handle.await;
    }

    info!("appmetrics daemon stopped");
    Ok(())
}

/// Periodically delete metrics older than `retention`.
async fn run_retention(
    store: MetricsStore,
    clock: Arc<dyn Clock>,
    retention: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let cutoff = retention_cutoff(clock.now(), retention);
        match store.prune_instance_metrics(cutoff) {
            Ok(removed) => debug!(removed, cutoff, "retention pass finished"),
            Err(e) => warn!(error = %e, "failed to prune instance metrics"),
        }

        let mut timer = clock.new_timer(every);
        tokio::select! {
            _ = shutdown.changed() => {
                timer.stop();
                break;
            }
            _ = timer.fired() => {}
        }
    }
}

/// Unix-nanosecond cutoff below which metrics are expired.
fn retention_cutoff(now: i64, retention: Duration) -> i64 {
    let retention = i64::try_from(retention.as_nanos()).unwrap_or(i64::MAX);
    now.saturating_sub(retention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appmetrics_collector::FakeClock;
    use appmetrics_core::InstanceMetric;

    fn metric(collected_at: i64) -> InstanceMetric {
        InstanceMetric {
            app_id: "app-1".to_string(),
            instance_index: 0,
            collected_at,
            name: "memoryused".to_string(),
            unit: "megabytes".to_string(),
            value: "1".to_string(),
            timestamp: collected_at,
        }
    }

    #[test]
    fn cutoff_subtracts_retention() {
        assert_eq!(retention_cutoff(10_000_000_000, Duration::from_secs(4)), 6_000_000_000);
        assert_eq!(retention_cutoff(0, Duration::MAX), -i64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn retention_task_prunes_old_rows() {
        let store = MetricsStore::open_in_memory().unwrap();
        let hour = 3_600_000_000_000;
        store.put_instance_metric(&metric(hour)).unwrap();
        store.put_instance_metric(&metric(3 * hour)).unwrap();

        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(4 * hour));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_retention(
            store.clone(),
            clock,
            Duration::from_secs(2 * 3600),
            Duration::from_secs(60),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let left = store.list_instance_metrics("app-1", None, 0, i64::MAX).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].collected_at, 3 * hour);
    }
}
