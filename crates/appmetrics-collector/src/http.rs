//! HTTP telemetry source.
//!
//! Fetches `GET /v1/apps/{app_id}/containermetrics` over HTTP/1.1 and
//! decodes the JSON array of envelopes in the response body.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use tracing::debug;

use appmetrics_core::Envelope;

use crate::error::TelemetryError;
use crate::source::{BoxFuture, TelemetrySource};

/// Telemetry source backed by a plain HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    /// `host:port` of the endpoint.
    address: String,
    timeout: Duration,
}

impl HttpTelemetrySource {
    /// Create a source for `host:port` with a per-request timeout.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Fetch container envelopes for `app_id`, bounded by the configured timeout.
    pub async fn fetch(
        &self,
        app_id: &str,
        authorization: &str,
    ) -> Result<Vec<Envelope>, TelemetryError> {
        let path = format!("/v1/apps/{app_id}/containermetrics");
        match tokio::time::timeout(self.timeout, self.request(&path, authorization)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(address = %self.address, %path, "telemetry request timed out");
                Err(TelemetryError::Timeout(self.timeout))
            }
        }
    }

    async fn request(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<Vec<Envelope>, TelemetryError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| TelemetryError::Connect(e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| TelemetryError::Handshake(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", self.address.as_str())
            .header("authorization", authorization)
            .header("accept", "application/json")
            .header("user-agent", "appmetrics-collector/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| TelemetryError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| TelemetryError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, %path, "telemetry request non-2xx");
            return Err(TelemetryError::Status(status.as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| TelemetryError::Body(e.to_string()))?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| TelemetryError::Decode(e.to_string()))
    }
}

impl TelemetrySource for HttpTelemetrySource {
    fn container_envelopes<'a>(
        &'a self,
        app_id: &'a str,
        authorization: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Envelope>, TelemetryError>> {
        Box::pin(self.fetch(app_id, authorization))
    }
}
