//! MetricsStore — redb-backed persistence for instance metrics.
//!
//! Values are JSON-serialized `InstanceMetric`s. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use tracing::debug;

use appmetrics_core::InstanceMetric;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe instance metrics store backed by redb.
#[derive(Clone)]
pub struct MetricsStore {
    db: Arc<Database>,
}

impl MetricsStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "metrics store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory metrics store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INSTANCE_METRICS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Append one metric. Rows are never replaced: a metric whose key is
    /// already taken is stored under a suffixed key.
    pub fn put_instance_metric(&self, metric: &InstanceMetric) -> StateResult<()> {
        let base = instance_metric_key(
            &metric.app_id,
            metric.collected_at,
            metric.instance_index,
            metric.timestamp,
            &metric.name,
        );
        let value = serde_json::to_vec(metric).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INSTANCE_METRICS).map_err(map_err!(Table))?;
            let mut key = base.clone();
            let mut n = 0;
            while table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                n += 1;
                key = duplicate_key(&base, n);
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List an application's metrics collected within `[start, end]`,
    /// oldest first, optionally restricted to one instance.
    pub fn list_instance_metrics(
        &self,
        app_id: &str,
        instance_index: Option<u32>,
        start: i64,
        end: i64,
    ) -> StateResult<Vec<InstanceMetric>> {
        let mut results = Vec::new();
        if end < start {
            return Ok(results);
        }

        let lower = range_start(app_id, start);
        let upper = range_end(app_id, end);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCE_METRICS).map_err(map_err!(Table))?;
        for entry in table
            .range(lower.as_str()..upper.as_str())
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let metric: InstanceMetric =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            // Keys of apps whose id extends this one can fall inside the range.
            if metric.app_id != app_id {
                continue;
            }
            if instance_index.is_some_and(|idx| idx != metric.instance_index) {
                continue;
            }
            results.push(metric);
        }
        Ok(results)
    }

    /// Delete every metric collected before `before`. Returns the number of
    /// rows removed.
    pub fn prune_instance_metrics(&self, before: i64) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(INSTANCE_METRICS).map_err(map_err!(Table))?;
            let mut stale = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let key = key.value();
                if collected_at_of(key).is_some_and(|at| at < before) {
                    stale.push(key.to_string());
                }
            }
            for key in &stale {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            removed = stale.len() as u64;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(before, removed, "instance metrics pruned");
        Ok(removed)
    }

    /// Total number of stored metrics.
    pub fn count_instance_metrics(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCE_METRICS).map_err(map_err!(Table))?;
        table.len().map_err(map_err!(Read))
    }
}
