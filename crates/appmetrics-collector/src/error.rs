//! Error types for the collector.

use std::time::Duration;

use thiserror::Error;

/// Errors from poller lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poll interval for app {app_id} must be greater than zero")]
    InvalidInterval { app_id: String },

    #[error("poller for app {app_id} is already running")]
    AlreadyRunning { app_id: String },
}

/// Errors returned by a telemetry source.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to decode envelopes: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
