//! appmetrics-core — shared types for the appmetrics collector.
//!
//! Holds the raw telemetry envelope model, the normalized
//! [`InstanceMetric`] record, the pure envelope → metric conversion, and
//! the `appmetrics.toml` configuration parser.

pub mod config;
pub mod convert;
pub mod types;

pub use config::AppMetricsConfig;
pub use convert::instance_memory_metrics;
pub use types::*;
