//! Observability for Portcullis.
//!
//! - **Logging**: structured JSON (or pretty) output through `tracing-subscriber`
//! - **Metrics**: Prometheus text format through the `metrics` facade
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portcullis_requests_total` | Counter | `endpoint`, `status` | Requests served |
//! | `portcullis_request_duration_seconds` | Histogram | `endpoint` | Request latency |
//! | `portcullis_in_flight_requests` | Gauge | - | Requests currently being decided |
//! | `portcullis_authz_decisions_total` | Counter | `verdict` | Verdicts reached |
//! | `portcullis_authz_failures_total` | Counter | `category` | Pipeline errors |
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_telemetry::{init_logging, init_metrics, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! init_metrics(true)?;
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_authz_decision, record_authz_failure, record_request, render_metrics,
    InFlightGuard,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
