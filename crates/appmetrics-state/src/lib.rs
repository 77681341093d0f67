//! appmetrics-state — durable store for instance metrics.
//!
//! Backed by [redb](https://docs.rs/redb), with on-disk and in-memory
//! backends. Each [`InstanceMetric`](appmetrics_core::InstanceMetric) is
//! JSON-serialized into one row, keyed so that an application's rows are
//! contiguous and ordered by collection time.
//!
//! The `MetricsStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across pollers.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::MetricsStore;
