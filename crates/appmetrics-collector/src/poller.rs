//! AppPoller — the per-application poll loop.
//!
//! A started poller owns one background task that alternates between a
//! poll cycle (fetch, convert, persist) and waiting for either the next
//! interval tick or a stop signal. Stop is cooperative: it is only seen
//! at the wait point, so a cycle already in flight always completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use appmetrics_core::{AppId, Envelope, instance_memory_metrics};

use crate::clock::Clock;
use crate::error::{PollerError, TelemetryError};
use crate::source::{CredentialProvider, InstanceMetricsSink, TelemetrySource};

/// Fetch attempts per cycle before the cycle is abandoned.
pub const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Everything a poller needs, fixed at construction.
#[derive(Clone)]
pub struct PollerConfig {
    pub app_id: AppId,
    pub poll_interval: Duration,
    pub source: Arc<dyn TelemetrySource>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub store: Arc<dyn InstanceMetricsSink>,
    pub clock: Arc<dyn Clock>,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Fetch attempts made (1..=MAX_FETCH_ATTEMPTS).
    pub fetch_attempts: u32,
    /// Whether any attempt returned envelopes.
    pub fetched: bool,
    pub saved: usize,
    pub failed: usize,
}

/// Handle to a running poll loop.
struct PollerTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Polls one application's container metrics on a fixed interval.
///
/// Dropping a running poller closes its stop channel; the loop then exits
/// at its next wait point.
pub struct AppPoller {
    config: Arc<PollerConfig>,
    task: Option<PollerTask>,
}

impl AppPoller {
    /// Create a stopped poller.
    pub fn new(config: PollerConfig) -> Result<Self, PollerError> {
        if config.poll_interval.is_zero() {
            return Err(PollerError::InvalidInterval {
                app_id: config.app_id,
            });
        }
        Ok(Self {
            config: Arc::new(config),
            task: None,
        })
    }

    /// Application this poller collects for.
    pub fn app_id(&self) -> &str {
        &self.config.app_id
    }

    /// Delay between the end of one cycle and the start of the next.
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Whether a poll loop is currently alive.
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Spawn the poll loop. The first cycle runs immediately.
    ///
    /// Must be called inside a tokio runtime. Fails with
    /// [`PollerError::AlreadyRunning`] if a loop is already alive; the
    /// existing loop is left untouched.
    pub fn start(&mut self) -> Result<(), PollerError> {
        if self.is_running() {
            return Err(PollerError::AlreadyRunning {
                app_id: self.config.app_id.clone(),
            });
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let span = info_span!("app_poller", app_id = %config.app_id);
        let handle = tokio::spawn(run_poll_loop(config, shutdown_rx).instrument(span));
        self.task = Some(PollerTask {
            handle,
            shutdown_tx,
        });

        info!(
            app_id = %self.config.app_id,
            poll_interval = ?self.config.poll_interval,
            "app poller started"
        );
        Ok(())
    }

    /// Signal the poll loop to stop and wait until it has exited.
    ///
    /// A cycle in progress finishes first. Stopping a stopped poller is a
    /// no-op.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            debug!(app_id = %self.config.app_id, "app poller not running");
            return;
        };

        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            error!(app_id = %self.config.app_id, error = %e, "app poller task failed");
        }

        info!(app_id = %self.config.app_id, "app poller stopped");
    }
}

/// The scheduling loop: poll, arm the timer, wait for tick or stop.
async fn run_poll_loop(config: Arc<PollerConfig>, mut shutdown: watch::Receiver<bool>) {
    debug!(poll_interval = ?config.poll_interval, "poll loop starting");

    loop {
        let report = poll_metrics(&config).await;
        debug!(?report, "poll cycle finished");

        let mut timer = config.clock.new_timer(config.poll_interval);
        tokio::select! {
            biased;
            // A closed channel means the poller was dropped.
            _ = shutdown.changed() => {
                timer.stop();
                debug!("poll loop shutting down");
                break;
            }
            _ = timer.fired() => {}
        }
    }
}

/// Run one poll cycle: fetch with retry, convert, persist each metric.
async fn poll_metrics(config: &PollerConfig) -> CycleReport {
    let mut report = CycleReport::default();
    let authorization = format!("bearer {}", config.credentials.access_token());

    let envelopes = match fetch_envelopes(config, &authorization, &mut report).await {
        Ok(envelopes) => envelopes,
        Err(e) => {
            error!(
                error = %e,
                attempts = report.fetch_attempts,
                "failed to fetch container envelopes"
            );
            return report;
        }
    };
    report.fetched = true;

    let collected_at = config.clock.now();
    let metrics = instance_memory_metrics(collected_at, &config.app_id, &envelopes);
    debug!(
        envelopes = envelopes.len(),
        metrics = metrics.len(),
        collected_at,
        "converted container envelopes"
    );

    for metric in &metrics {
        match config.store.save_metric(metric) {
            Ok(()) => report.saved += 1,
            Err(e) => {
                report.failed += 1;
                error!(error = %e, ?metric, "failed to save instance metric");
            }
        }
    }

    report
}

/// Fetch envelopes, retrying immediately on any error.
async fn fetch_envelopes(
    config: &PollerConfig,
    authorization: &str,
    report: &mut CycleReport,
) -> Result<Vec<Envelope>, TelemetryError> {
    loop {
        report.fetch_attempts += 1;
        let attempt = report.fetch_attempts;
        debug!(attempt, "fetching container envelopes");

        match config
            .source
            .container_envelopes(&config.app_id, authorization)
            .await
        {
            Ok(envelopes) => return Ok(envelopes),
            Err(e) if attempt < MAX_FETCH_ATTEMPTS => {
                debug!(attempt, error = %e, "fetch attempt failed, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}
