//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_attempts_total` (counter): completed attempts by operation, outcome
//! - `resilience_circuit_transitions_total` (counter): breaker transitions by operation, target state
//! - `resilience_rejections_total` (counter): attempts refused by an open breaker
//! - `resilience_executions_total` (counter): finished invocations by operation, result

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::operation::OperationId;
use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_attempt(operation: &OperationId, outcome: &'static str) {
    counter!(
        "resilience_attempts_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_transition(operation: &OperationId, to: CircuitState) {
    counter!(
        "resilience_circuit_transitions_total",
        "operation" => operation.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_rejection(operation: &OperationId) {
    counter!("resilience_rejections_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_execution(operation: &OperationId, result: &'static str) {
    counter!(
        "resilience_executions_total",
        "operation" => operation.to_string(),
        "result" => result
    )
    .increment(1);
}
