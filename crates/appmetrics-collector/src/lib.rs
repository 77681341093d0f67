//! appmetrics-collector — periodic instance-metric collection.
//!
//! Each monitored application gets one [`AppPoller`]: a background task
//! that fetches container telemetry, converts it to instance metrics and
//! persists every metric on its own. The [`Collector`] supervises one
//! poller per application and keeps the set in sync with an
//! [`AppDirectory`].
//!
//! # Architecture
//!
//! ```text
//! Collector
//!   ├── AppDirectory → desired app ids (refreshed on a timer)
//!   └── AppPoller (one per app)
//!       ├── CredentialProvider → bearer token (once per cycle)
//!       ├── TelemetrySource → Vec<Envelope> (up to 3 attempts)
//!       ├── instance_memory_metrics() → Vec<InstanceMetric>
//!       └── InstanceMetricsSink::save_metric() per metric
//! ```
//!
//! Timing goes through the [`Clock`] trait so tests can drive the loop
//! with tokio's paused clock via [`FakeClock`].

pub mod clock;
pub mod collector;
pub mod error;
pub mod http;
pub mod poller;
pub mod source;

pub use clock::{Clock, FakeClock, SystemClock, Timer};
pub use collector::{AppDirectory, Collector, StaticApps, SyncSummary};
pub use error::{PollerError, TelemetryError};
pub use http::HttpTelemetrySource;
pub use poller::{AppPoller, CycleReport, MAX_FETCH_ATTEMPTS, PollerConfig};
pub use source::{
    BoxFuture, CredentialProvider, InstanceMetricsSink, StaticCredentials, TelemetrySource,
};
