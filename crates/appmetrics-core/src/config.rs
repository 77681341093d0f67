//! appmetrics.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetricsConfig {
    /// Applications to poll.
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default)]
    pub collector: CollectorConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `host:port` of the telemetry endpoint.
    pub address: String,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
    /// Environment variable holding the token. Takes precedence over `token`
    /// when it is set.
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub retention: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_poll_interval() -> String {
    "30s".to_string()
}

fn default_refresh_interval() -> String {
    "60s".to_string()
}

impl AppMetricsConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppMetricsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every duration parses and the poll interval is positive.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval()?.is_zero() {
            bail!("collector.poll_interval must be greater than zero");
        }
        if self.refresh_interval()?.is_zero() {
            bail!("collector.refresh_interval must be greater than zero");
        }
        self.telemetry_timeout()?;
        self.retention()?;
        if self.telemetry.address.trim().is_empty() {
            bail!("telemetry.address must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.collector.poll_interval)
            .context("invalid collector.poll_interval")
    }

    pub fn refresh_interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.collector.refresh_interval)
            .context("invalid collector.refresh_interval")
    }

    pub fn telemetry_timeout(&self) -> anyhow::Result<Duration> {
        match &self.telemetry.timeout {
            Some(t) => parse_duration(t).context("invalid telemetry.timeout"),
            None => Ok(Duration::from_secs(5)),
        }
    }

    /// How long stored metrics are kept. `None` disables pruning.
    pub fn retention(&self) -> anyhow::Result<Option<Duration>> {
        self.store
            .retention
            .as_deref()
            .map(|r| parse_duration(r).context("invalid store.retention"))
            .transpose()
    }

    /// Resolve the bearer token. A set `token_env` variable wins; otherwise
    /// `token` is used.
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        if let Some(var) = &self.auth.token_env {
            if let Ok(token) = std::env::var(var) {
                return Ok(token);
            }
            return match &self.auth.token {
                Some(token) => Ok(token.clone()),
                None => bail!("environment variable {var} is not set and no auth.token is set"),
            };
        }
        match &self.auth.token {
            Some(token) => Ok(token.clone()),
            None => bail!("no auth.token or auth.token_env configured"),
        }
    }
}

/// Parse a duration string like "500ms", "5s", "2m", "1h" (bare numbers are seconds).
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, unit_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("bad duration {s:?}"))?;
    Ok(Duration::from_millis(value.saturating_mul(unit_ms)))
}
