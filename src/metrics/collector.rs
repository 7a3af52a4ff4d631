//! Metrics Collector

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Collects and exports connection graph metrics
pub struct Metrics {
    registry: Registry,
    graph_operations_total: IntCounterVec,
    one_sided_writes_total: IntCounter,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Self {
        let registry = Registry::new();

        let graph_operations_total = IntCounterVec::new(
            Opts::new(
                "founderlink_graph_operations_total",
                "Connection graph operations by outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("Failed to create graph_operations_total counter");

        let one_sided_writes_total = IntCounter::new(
            "founderlink_one_sided_writes_total",
            "Paired writes where only the first record was persisted",
        )
        .expect("Failed to create one_sided_writes_total counter");

        registry
            .register(Box::new(graph_operations_total.clone()))
            .expect("Failed to register graph_operations_total");
        registry
            .register(Box::new(one_sided_writes_total.clone()))
            .expect("Failed to register one_sided_writes_total");

        Self {
            registry,
            graph_operations_total,
            one_sided_writes_total,
        }
    }

    /// Count one completed operation
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.graph_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Count a pair left one-sided by a failed mirrored write
    pub fn record_one_sided_write(&self) {
        self.one_sided_writes_total.inc();
    }

    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.graph_operations_total
            .with_label_values(&[operation, outcome])
            .get()
    }

    pub fn one_sided_writes(&self) -> u64 {
        self.one_sided_writes_total.get()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        match encoder.encode_to_string(&metric_families) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                String::new()
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new();
        metrics.record_operation("send_request", "ok");
        metrics.record_operation("send_request", "ok");
        metrics.record_operation("send_request", "conflict");

        assert_eq!(metrics.operation_count("send_request", "ok"), 2);
        assert_eq!(metrics.operation_count("send_request", "conflict"), 1);
        assert_eq!(metrics.operation_count("accept_request", "ok"), 0);
    }

    #[test]
    fn test_export_prometheus() {
        let metrics = Metrics::new();
        metrics.record_operation("remove_connection", "ok");
        metrics.record_one_sided_write();

        let text = metrics.export_prometheus();
        assert!(text.contains("founderlink_graph_operations_total"));
        assert!(text.contains("founderlink_one_sided_writes_total 1"));
    }
}
