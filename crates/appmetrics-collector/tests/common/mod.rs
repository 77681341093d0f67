//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appmetrics_collector::*;
use appmetrics_core::{ContainerMetric, Envelope, InstanceMetric};

pub fn envelope(app_id: &str, index: i32, memory_mb: u64) -> Envelope {
    Envelope::container(
        1,
        ContainerMetric {
            application_id: app_id.to_string(),
            instance_index: index,
            cpu_percentage: 10.0,
            memory_bytes: memory_mb * 1024 * 1024,
            disk_bytes: 0,
        },
    )
}

/// Returns scripted responses per app; two healthy instances once the
/// script runs out.
#[derive(Default)]
pub struct FakeSource {
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<Envelope>, TelemetryError>>>>,
    calls: Mutex<HashMap<String, u32>>,
    total: AtomicU32,
}

impl FakeSource {
    pub fn script(&self, app_id: &str, responses: Vec<Result<Vec<Envelope>, TelemetryError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(app_id.to_string(), responses.into());
    }

    pub fn calls_for(&self, app_id: &str) -> u32 {
        self.calls.lock().unwrap().get(app_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for FakeSource {
    fn container_envelopes<'a>(
        &'a self,
        app_id: &'a str,
        _authorization: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Envelope>, TelemetryError>> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(app_id.to_string())
            .or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(app_id)
            .and_then(|script| script.pop_front());
        let result = next.unwrap_or_else(|| Ok(vec![envelope(app_id, 0, 64), envelope(app_id, 1, 96)]));
        Box::pin(async move { result })
    }
}

/// In-memory sink that can be told to reject specific calls.
#[derive(Default)]
pub struct FakeStore {
    calls: AtomicU32,
    saved: Mutex<Vec<InstanceMetric>>,
    /// 1-based call numbers that fail.
    fail_on: Mutex<HashSet<u32>>,
}

impl FakeStore {
    pub fn fail_on(&self, calls: &[u32]) {
        self.fail_on.lock().unwrap().extend(calls.iter().copied());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<InstanceMetric> {
        self.saved.lock().unwrap().clone()
    }

    pub fn saved_for(&self, app_id: &str) -> Vec<InstanceMetric> {
        self.saved()
            .into_iter()
            .filter(|m| m.app_id == app_id)
            .collect()
    }
}

impl InstanceMetricsSink for FakeStore {
    fn save_metric(&self, metric: &InstanceMetric) -> anyhow::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.lock().unwrap().contains(&n) {
            anyhow::bail!("write rejected");
        }
        self.saved.lock().unwrap().push(metric.clone());
        Ok(())
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub store: Arc<FakeStore>,
    pub clock: Arc<FakeClock>,
}

impl Harness {
    /// Collaborators with the clock anchored at t=0.
    pub fn new() -> Self {
        Self {
            source: Arc::new(FakeSource::default()),
            store: Arc::new(FakeStore::default()),
            clock: Arc::new(FakeClock::new(0)),
        }
    }

    pub fn poller_config(&self, app_id: &str, poll_interval: Duration) -> PollerConfig {
        PollerConfig {
            app_id: app_id.to_string(),
            poll_interval,
            source: self.source.clone(),
            credentials: Arc::new(StaticCredentials::new("token")),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn collector(&self, poll_interval: Duration) -> Collector {
        Collector::new(
            poll_interval,
            self.source.clone(),
            Arc::new(StaticCredentials::new("token")),
            self.store.clone(),
            self.clock.clone(),
        )
    }
}
