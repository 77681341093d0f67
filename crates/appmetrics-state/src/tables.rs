//! redb table definitions for the metrics store.

use redb::TableDefinition;

/// Instance metrics keyed by
/// `{app_id}:{collected_at:020}:{instance_index:010}:{timestamp:020}:{name}`,
/// with a `#{n}` suffix when an identical key is already stored.
///
/// Zero-padded numeric segments make lexicographic key order match time
/// order within one application.
pub const INSTANCE_METRICS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("instance_metrics");

/// Build the base row key for one metric.
pub fn instance_metric_key(
    app_id: &str,
    collected_at: i64,
    instance_index: u32,
    timestamp: i64,
    name: &str,
) -> String {
    format!(
        "{app_id}:{:020}:{instance_index:010}:{:020}:{name}",
        collected_at.max(0),
        timestamp.max(0)
    )
}

/// Disambiguate `base` for the `n`th duplicate row.
pub fn duplicate_key(base: &str, n: u32) -> String {
    format!("{base}#{n:06}")
}

/// Smallest possible key for `app_id` at or after `collected_at`.
pub fn range_start(app_id: &str, collected_at: i64) -> String {
    format!("{app_id}:{:020}:", collected_at.max(0))
}

/// A key sorting after every row of `app_id` at `collected_at`.
pub fn range_end(app_id: &str, collected_at: i64) -> String {
    format!("{app_id}:{:020};", collected_at.max(0))
}

/// Extract the `collected_at` segment from a row key.
pub fn collected_at_of(key: &str) -> Option<i64> {
    let mut parts = key.rsplitn(5, ':');
    let _name = parts.next()?;
    let _timestamp = parts.next()?;
    let _index = parts.next()?;
    let rest = parts.next()?;
    rest.parse().ok()
}
