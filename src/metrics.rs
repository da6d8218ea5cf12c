//! Metrics and telemetry for the insights pipeline
//!
//! Prometheus metrics for remote store traffic, pipeline latency and
//! failures. Exposed by the server at `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::Error;

lazy_static! {
    // === Remote store traffic ===

    /// Multi-series datapoint requests issued, by outcome
    pub static ref BATCH_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "insights_batch_calls_total",
        "Total multi-series datapoint requests issued to the store",
        &["status"]
    ).unwrap();

    /// Items carried by multi-series datapoint requests
    pub static ref BATCH_ITEMS_TOTAL: CounterVec = register_counter_vec!(
        "insights_batch_items_total",
        "Total query items sent to the store",
        &["operation"]
    ).unwrap();

    /// Descriptor lookups issued, by outcome
    pub static ref DESCRIPTOR_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "insights_descriptor_lookups_total",
        "Total series descriptor lookups issued to the store",
        &["status"]
    ).unwrap();

    // === Pipeline ===

    /// Pipeline operation duration
    pub static ref PIPELINE_DURATION: HistogramVec = register_histogram_vec!(
        "insights_pipeline_duration_seconds",
        "Pipeline operation latency in seconds",
        &["operation"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();

    /// Pipeline failures by kind
    pub static ref PIPELINE_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "insights_pipeline_failures_total",
        "Total pipeline failures by operation and error kind",
        &["operation", "kind"]
    ).unwrap();

    /// Rows produced by the flattener
    pub static ref FLATTENED_ROWS_TOTAL: CounterVec = register_counter_vec!(
        "insights_flattened_rows_total",
        "Total flattened measurement rows",
        &["operation"]
    ).unwrap();

    // === System Health ===

    /// Health status (0=unhealthy, 1=healthy)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "insights_health_status",
        "Service health status (0=unhealthy, 1=healthy)"
    ).unwrap();
}

/// Initialize metrics system
pub fn init() {
    HEALTH_STATUS.set(1.0);
    tracing::info!("Metrics system initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record one multi-series datapoint request
#[inline]
pub fn record_batch_call(items: usize, success: bool) {
    let status = if success { "success" } else { "error" };
    BATCH_CALLS_TOTAL.with_label_values(&[status]).inc();
    BATCH_ITEMS_TOTAL
        .with_label_values(&["query_multi"])
        .inc_by(items as f64);
}

/// Record one descriptor lookup
#[inline]
pub fn record_descriptor_lookup(success: bool) {
    let status = if success { "success" } else { "error" };
    DESCRIPTOR_LOOKUPS_TOTAL.with_label_values(&[status]).inc();
}

/// Record the duration of a pipeline operation
#[inline]
pub fn record_pipeline(operation: &str, duration_secs: f64) {
    PIPELINE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Record a pipeline failure
#[inline]
pub fn record_failure(operation: &str, error: &Error) {
    PIPELINE_FAILURES_TOTAL
        .with_label_values(&[operation, error.kind()])
        .inc();
}

/// Record rows emitted by the flattener
#[inline]
pub fn record_flattened_rows(operation: &str, rows: usize) {
    FLATTENED_ROWS_TOTAL
        .with_label_values(&[operation])
        .inc_by(rows as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init();
        assert_eq!(HEALTH_STATUS.get(), 1.0);
    }

    #[test]
    fn test_record_failure_by_kind() {
        record_failure("consolidate", &Error::Query("chunk failed".into()));
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("insights_pipeline_failures_total"));
        assert!(metrics.contains("kind=\"query\""));
    }

    #[test]
    fn test_record_batch_call() {
        record_batch_call(100, true);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("insights_batch_calls_total"));
        assert!(metrics.contains("insights_batch_items_total"));
    }
}
