//! Collaborator contracts consumed by the poller.
//!
//! Implementations are shared across pollers behind `Arc`, so every
//! contract is `Send + Sync`.

use std::future::Future;
use std::pin::Pin;

use appmetrics_core::{Envelope, InstanceMetric};
use appmetrics_state::MetricsStore;

use crate::error::TelemetryError;

/// Boxed future returned by async collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies the bearer token used to authenticate telemetry requests.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> String;
}

/// Fetches raw container envelopes for an application.
pub trait TelemetrySource: Send + Sync {
    /// `authorization` is the full header value, e.g. `bearer <token>`.
    fn container_envelopes<'a>(
        &'a self,
        app_id: &'a str,
        authorization: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Envelope>, TelemetryError>>;
}

/// Durably persists one instance metric at a time.
pub trait InstanceMetricsSink: Send + Sync {
    fn save_metric(&self, metric: &InstanceMetric) -> anyhow::Result<()>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> String {
        self.token.clone()
    }
}

impl InstanceMetricsSink for MetricsStore {
    fn save_metric(&self, metric: &InstanceMetric) -> anyhow::Result<()> {
        self.put_instance_metric(metric)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_credentials_return_token() {
        let creds = StaticCredentials::new("abc");
        assert_eq!(creds.access_token(), "abc");
    }

    #[test]
    fn metrics_store_is_a_sink() {
        let store = MetricsStore::open_in_memory().unwrap();
        let metric = InstanceMetric {
            app_id: "app-1".to_string(),
            instance_index: 0,
            collected_at: 10,
            name: "memoryused".to_string(),
            unit: "megabytes".to_string(),
            value: "12".to_string(),
            timestamp: 9,
        };

        let sink: &dyn InstanceMetricsSink = &store;
        sink.save_metric(&metric).unwrap();

        let rows = store.list_instance_metrics("app-1", None, 0, 100).unwrap();
        assert_eq!(rows, vec![metric]);
    }
}
