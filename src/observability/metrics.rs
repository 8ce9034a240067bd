//! Metrics collection and exposition.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
///
/// Failure to bind is logged, never fatal: the bridge keeps serving and
/// metric updates become no-ops.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint started"),
        Err(error) => tracing::error!(%error, "failed to install metrics exporter"),
    }
}

/// Count one webhook message by outcome.
pub fn record_message(outcome: &'static str) {
    metrics::counter!("bridge_messages_total", "outcome" => outcome).increment(1);
}

/// Count one backend call by kind.
pub fn record_backend_request(kind: &'static str) {
    metrics::counter!("ragflow_requests_total", "kind" => kind).increment(1);
}

/// Count one backend retry (attempts beyond the first).
pub fn record_backend_retry() {
    metrics::counter!("ragflow_retries_total").increment(1);
}

/// Track the number of answer entries held.
pub fn record_cache_size(entries: usize) {
    metrics::gauge!("answer_cache_entries").set(entries as f64);
}
