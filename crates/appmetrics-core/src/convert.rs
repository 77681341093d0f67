//! Envelope → instance metric conversion.

use crate::types::*;

const BYTES_PER_MEGABYTE: f64 = (1024 * 1024) as f64;

/// Convert a batch of envelopes into memory metrics for `app_id`.
///
/// Non-container events and container metrics for other applications are
/// skipped. Output order follows input order. Memory is reported in
/// megabytes, rounded half up.
pub fn instance_memory_metrics(
    collected_at: i64,
    app_id: &str,
    envelopes: &[Envelope],
) -> Vec<InstanceMetric> {
    envelopes
        .iter()
        .filter_map(|envelope| memory_metric(collected_at, app_id, envelope))
        .collect()
}

fn memory_metric(collected_at: i64, app_id: &str, envelope: &Envelope) -> Option<InstanceMetric> {
    if envelope.event_type != EventType::ContainerMetric {
        return None;
    }
    let cm = envelope.container_metric.as_ref()?;
    if cm.application_id != app_id {
        return None;
    }

    let megabytes = (cm.memory_bytes as f64 / BYTES_PER_MEGABYTE + 0.5) as u64;

    Some(InstanceMetric {
        app_id: app_id.to_string(),
        instance_index: cm.instance_index.max(0) as u32,
        collected_at,
        name: METRIC_NAME_MEMORY.to_string(),
        unit: UNIT_MEGABYTES.to_string(),
        value: megabytes.to_string(),
        timestamp: envelope.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(app_id: &str, index: i32, memory_bytes: u64) -> ContainerMetric {
        ContainerMetric {
            application_id: app_id.to_string(),
            instance_index: index,
            cpu_percentage: 12.5,
            memory_bytes,
            disk_bytes: 0,
        }
    }

    #[test]
    fn converts_container_metrics_in_order() {
        let envelopes = vec![
            Envelope::container(111, container("app-1", 0, 64 * 1024 * 1024)),
            Envelope::container(222, container("app-1", 1, 128 * 1024 * 1024)),
        ];

        let metrics = instance_memory_metrics(1_000, "app-1", &envelopes);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].instance_index, 0);
        assert_eq!(metrics[0].value, "64");
        assert_eq!(metrics[0].timestamp, 111);
        assert_eq!(metrics[1].instance_index, 1);
        assert_eq!(metrics[1].value, "128");
        assert!(metrics.iter().all(|m| m.collected_at == 1_000));
        assert!(metrics.iter().all(|m| m.name == METRIC_NAME_MEMORY));
        assert!(metrics.iter().all(|m| m.unit == UNIT_MEGABYTES));
    }

    #[test]
    fn skips_other_apps_and_event_types() {
        let mut log = Envelope::container(5, container("app-1", 0, 1));
        log.event_type = EventType::LogMessage;
        let missing = Envelope {
            origin: "rep".to_string(),
            event_type: EventType::ContainerMetric,
            timestamp: 6,
            container_metric: None,
        };
        let envelopes = vec![
            log,
            missing,
            Envelope::container(7, container("app-2", 0, 1024 * 1024)),
            Envelope::container(8, container("app-1", 3, 1024 * 1024)),
        ];

        let metrics = instance_memory_metrics(0, "app-1", &envelopes);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].instance_index, 3);
    }

    #[test]
    fn rounds_megabytes_half_up() {
        let half = 1024 * 1024 / 2;
        let envelopes = vec![
            Envelope::container(0, container("a", 0, 10 * 1024 * 1024 + half)),
            Envelope::container(0, container("a", 1, 10 * 1024 * 1024 + half - 1)),
        ];
        let metrics = instance_memory_metrics(0, "a", &envelopes);
        assert_eq!(metrics[0].value, "11");
        assert_eq!(metrics[1].value, "10");
    }

    #[test]
    fn empty_batch_yields_no_metrics() {
        assert!(instance_memory_metrics(0, "a", &[]).is_empty());
    }

    #[test]
    fn envelope_json_uses_camel_case() {
        let json = r#"{
            "origin": "rep",
            "eventType": "ContainerMetric",
            "timestamp": 42,
            "containerMetric": {
                "applicationId": "app-1",
                "instanceIndex": 2,
                "cpuPercentage": 1.5,
                "memoryBytes": 2097152,
                "diskBytes": 0
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event_type, EventType::ContainerMetric);
        let cm = envelope.container_metric.unwrap();
        assert_eq!(cm.application_id, "app-1");
        assert_eq!(cm.instance_index, 2);
    }
}
