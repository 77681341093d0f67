//! Collector — supervises one `AppPoller` per monitored application.
//!
//! The desired set of applications comes from an [`AppDirectory`] and is
//! re-read on every refresh tick: new applications get a poller, removed
//! ones have theirs stopped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use appmetrics_core::AppId;

use crate::clock::Clock;
use crate::error::PollerError;
use crate::poller::{AppPoller, PollerConfig};
use crate::source::{CredentialProvider, InstanceMetricsSink, TelemetrySource};

/// Source of the application ids that should be polled.
pub trait AppDirectory: Send + Sync {
    fn app_ids(&self) -> anyhow::Result<HashSet<AppId>>;
}

/// A fixed set of applications.
#[derive(Debug, Clone, Default)]
pub struct StaticApps(pub HashSet<AppId>);

impl StaticApps {
    /// Build the set from any iterator of ids.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AppId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }
}

impl AppDirectory for StaticApps {
    fn app_ids(&self) -> anyhow::Result<HashSet<AppId>> {
        Ok(self.0.clone())
    }
}

/// Result of reconciling running pollers against a desired app set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub started: usize,
    pub stopped: usize,
}

/// Manages pollers for all monitored applications.
pub struct Collector {
    poll_interval: Duration,
    source: Arc<dyn TelemetrySource>,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn InstanceMetricsSink>,
    clock: Arc<dyn Clock>,
    /// Active pollers: app_id → poller.
    pollers: RwLock<HashMap<AppId, AppPoller>>,
}

impl Collector {
    /// Create a collector whose pollers share these collaborators.
    pub fn new(
        poll_interval: Duration,
        source: Arc<dyn TelemetrySource>,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<dyn InstanceMetricsSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            poll_interval,
            source,
            credentials,
            store,
            clock,
            pollers: RwLock::new(HashMap::new()),
        }
    }

    fn poller_config(&self, app_id: &str) -> PollerConfig {
        PollerConfig {
            app_id: app_id.to_string(),
            poll_interval: self.poll_interval,
            source: self.source.clone(),
            credentials: self.credentials.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Start polling an application. Returns `false` if it was already
    /// being polled.
    pub async fn start_app(&self, app_id: &str) -> Result<bool, PollerError> {
        let mut pollers = self.pollers.write().await;
        if pollers.contains_key(app_id) {
            return Ok(false);
        }

        let mut poller = AppPoller::new(self.poller_config(app_id))?;
        poller.start()?;
        pollers.insert(app_id.to_string(), poller);
        Ok(true)
    }

    /// Stop polling an application. Returns `true` if it was being polled.
    pub async fn stop_app(&self, app_id: &str) -> bool {
        // Release the map before waiting on the loop.
        let removed = self.pollers.write().await.remove(app_id);
        match removed {
            Some(mut poller) => {
                poller.stop().await;
                true
            }
            None => false,
        }
    }

    /// Start pollers for new apps in `desired` and stop the rest.
    pub async fn sync_apps(&self, desired: &HashSet<AppId>) -> SyncSummary {
        let current: HashSet<AppId> = self.pollers.read().await.keys().cloned().collect();
        let mut summary = SyncSummary::default();

        for app_id in current.difference(desired) {
            if self.stop_app(app_id).await {
                summary.stopped += 1;
            }
        }

        for app_id in desired.difference(&current) {
            match self.start_app(app_id).await {
                Ok(true) => summary.started += 1,
                Ok(false) => {}
                Err(e) => warn!(%app_id, error = %e, "failed to start app poller"),
            }
        }

        if summary != SyncSummary::default() {
            info!(
                started = summary.started,
                stopped = summary.stopped,
                total = desired.len(),
                "app pollers refreshed"
            );
        }
        summary
    }

    /// Stop every poller (for graceful shutdown).
    pub async fn stop_all(&self) {
        let drained: Vec<(AppId, AppPoller)> = self.pollers.write().await.drain().collect();
        for (app_id, mut poller) in drained {
            poller.stop().await;
            debug!(%app_id, "app poller removed");
        }
        info!("all app pollers stopped");
    }

    /// Ids of applications being polled, sorted.
    pub async fn active_apps(&self) -> Vec<AppId> {
        let mut ids: Vec<AppId> = self.pollers.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `app_id` currently has a poller.
    pub async fn is_polling(&self, app_id: &str) -> bool {
        self.pollers.read().await.contains_key(app_id)
    }

    /// Keep pollers in sync with `directory` until shutdown, then stop them all.
    ///
    /// The directory is read immediately and then every `refresh_interval`.
    /// A failed read keeps the current pollers.
    pub async fn run(
        &self,
        directory: &dyn AppDirectory,
        refresh_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            poll_interval = ?self.poll_interval,
            refresh_interval = ?refresh_interval,
            "collector started"
        );

        loop {
            match directory.app_ids() {
                Ok(desired) => {
                    self.sync_apps(&desired).await;
                }
                Err(e) => warn!(error = %e, "failed to refresh app list"),
            }

            let mut timer = self.clock.new_timer(refresh_interval);
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    timer.stop();
                    break;
                }
                _ = timer.fired() => {}
            }
        }

        self.stop_all().await;
        info!("collector stopped");
    }
}
