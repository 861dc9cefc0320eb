//! Breaker metrics.
//!
//! # Metrics
//! - `breaker_calls_total` (counter): admitted calls by breaker, outcome
//! - `breaker_rejections_total` (counter): refused calls by breaker, reason
//! - `breaker_transitions_total` (counter): state changes by breaker, from, to
//! - `breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! Recording goes through the `metrics` facade and is a no-op until a recorder
//! is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::resilience::State;

/// Install a process-wide Prometheus recorder.
///
/// The returned handle renders the exposition text; no listener is started.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Record an admitted call's outcome.
pub fn record_call(breaker: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("breaker_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record a refused call.
pub fn record_rejection(breaker: &str, reason: &'static str) {
    counter!("breaker_rejections_total", "breaker" => breaker.to_string(), "reason" => reason)
        .increment(1);
}

/// Record a state change and update the state gauge.
pub fn record_transition(breaker: &str, from: State, to: State) {
    counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_state(breaker: &str, state: State) {
    gauge!("breaker_state", "breaker" => breaker.to_string()).set(state.as_gauge());
}
