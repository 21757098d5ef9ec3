//! Prometheus metrics.
//!
//! The recorder is installed once per process and rendered on demand by the
//! server's metrics endpoint. Recording before installation is a no-op.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder.
///
/// Does nothing when `enabled` is false or a recorder was already installed
/// by an earlier call.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if another global recorder is
/// already in place.
pub fn init_metrics(enabled: bool) -> TelemetryResult<()> {
    if !enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "portcullis_requests_total",
        "Total number of HTTP requests served"
    );
    describe_histogram!(
        "portcullis_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "portcullis_in_flight_requests",
        "Number of authorization requests currently being decided"
    );
    describe_counter!(
        "portcullis_authz_decisions_total",
        "Authorization verdicts by outcome"
    );
    describe_counter!(
        "portcullis_authz_failures_total",
        "Authorization pipeline errors by category"
    );
}

/// Records a completed request.
pub fn record_request(endpoint: &str, status_code: u16, duration: Duration) {
    counter!(
        "portcullis_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "portcullis_request_duration_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a verdict (`authorized`, `unauthorized` or `forbidden`).
pub fn record_authz_decision(verdict: &str) {
    counter!(
        "portcullis_authz_decisions_total",
        "verdict" => verdict.to_string()
    )
    .increment(1);
}

/// Records a pipeline error by its category.
pub fn record_authz_failure(category: &str) {
    counter!(
        "portcullis_authz_failures_total",
        "category" => category.to_string()
    )
    .increment(1);
}

/// Tracks one in-flight authorization request for as long as it lives.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("portcullis_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("portcullis_in_flight_requests").decrement(1.0);
    }
}
