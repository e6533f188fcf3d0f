//! Metrics recording
//!
//! Thin wrappers around the `metrics` macros so call sites stay terse and
//! metric names/labels live in one place. With no recorder installed the
//! macros are no-ops; the optional Prometheus exporter (feature
//! `prometheus`) installs one.

use metrics::increment_counter;

/// Record one completion round against a provider
pub fn record_chat_round(provider: &str) {
    increment_counter!("chat_rounds_total", "provider" => provider.to_string());
}

/// Record one tool execution and its outcome
pub fn record_tool_execution(tool: &str, success: bool) {
    let status = if success { "ok" } else { "error" };
    increment_counter!(
        "chat_tool_executions_total",
        "tool" => tool.to_string(),
        "status" => status
    );
}

/// Record a provider call failure
pub fn record_provider_error(provider: &str) {
    increment_counter!("chat_provider_errors_total", "provider" => provider.to_string());
}

/// Record a file-manager operation and its outcome
pub fn record_file_operation(op: &str, success: bool) {
    let status = if success { "ok" } else { "error" };
    increment_counter!(
        "file_operations_total",
        "op" => op.to_string(),
        "status" => status
    );
}

/// Record sessions evicted by the size-cap policy
pub fn record_session_evictions(count: usize) {
    for _ in 0..count {
        increment_counter!("session_evictions_total");
    }
}

/// Install the Prometheus metrics exporter
///
/// Listens on 0.0.0.0:9000. Only available with the `prometheus` feature;
/// without it, metrics are recorded but not exported.
#[cfg(feature = "prometheus")]
pub fn init_metrics_exporter() {
    use metrics_exporter_prometheus::PrometheusBuilder;

    match PrometheusBuilder::new().install() {
        Ok(()) => tracing::info!("Prometheus metrics exporter installed on 0.0.0.0:9000"),
        Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
    }
}
