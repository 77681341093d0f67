//! App directory backed by the daemon's config file.

use std::collections::HashSet;
use std::path::PathBuf;

use appmetrics_collector::AppDirectory;
use appmetrics_core::{AppId, AppMetricsConfig};

/// Re-reads the `apps` list from the config file on every refresh, so
/// apps can be added or removed without a restart.
pub struct ConfigFileApps {
    path: PathBuf,
}

impl ConfigFileApps {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AppDirectory for ConfigFileApps {
    fn app_ids(&self) -> anyhow::Result<HashSet<AppId>> {
        let config = AppMetricsConfig::from_file(&self.path)?;
        Ok(config.apps.into_iter().collect())
    }
}
