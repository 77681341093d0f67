//! Telemetry and metric types.
//!
//! `Envelope` mirrors the JSON shape emitted by the streaming telemetry
//! source (camelCase keys). `InstanceMetric` is what gets persisted.

use serde::{Deserialize, Serialize};

/// Identifier of a monitored application.
pub type AppId = String;

/// Metric name for per-instance memory usage.
pub const METRIC_NAME_MEMORY: &str = "memoryused";

/// Unit for memory metrics.
pub const UNIT_MEGABYTES: &str = "megabytes";

// ── Raw telemetry ──────────────────────────────────────────────────

/// Kind of event carried by an [`Envelope`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    ContainerMetric,
    HttpStartStop,
    LogMessage,
    ValueMetric,
    CounterEvent,
    Error,
}

/// One raw unit of telemetry for an application instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Component that emitted the event.
    pub origin: String,
    pub event_type: EventType,
    /// Emission time, unix nanoseconds.
    pub timestamp: i64,
    /// Present when `event_type` is `ContainerMetric`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_metric: Option<ContainerMetric>,
}

/// Resource usage of one container at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMetric {
    pub application_id: AppId,
    pub instance_index: i32,
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
}

impl Envelope {
    /// Build a container-metric envelope.
    pub fn container(timestamp: i64, metric: ContainerMetric) -> Self {
        Self {
            origin: "rep".to_string(),
            event_type: EventType::ContainerMetric,
            timestamp,
            container_metric: Some(metric),
        }
    }
}

// ── Normalized metrics ─────────────────────────────────────────────

/// A normalized, timestamped metric for one application instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceMetric {
    pub app_id: AppId,
    pub instance_index: u32,
    /// Poll time (unix nanoseconds), shared by every metric of one poll.
    pub collected_at: i64,
    pub name: String,
    pub unit: String,
    /// Decimal value, interpreted according to `unit`.
    pub value: String,
    /// Time the source reported the sample (unix nanoseconds).
    pub timestamp: i64,
}
