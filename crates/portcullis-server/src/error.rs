//! Error types for the Portcullis server.

use std::fmt;

use portcullis_config::ConfigError;
use portcullis_core::AuthzError;
use portcullis_telemetry::TelemetryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server startup and runtime errors.
///
/// Per-request failures never surface here; the pipeline answers those
/// itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid setting detected while wiring the server.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    ConfigLoad(#[from] ConfigError),

    /// The pipeline could not be assembled.
    #[error("Pipeline error: {0}")]
    Authz(#[from] AuthzError),

    /// Logging or metrics could not be installed.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a bind error.
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Get the error category for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::ConfigLoad(_) => "config",
            Self::Authz(_) => "authz",
            Self::Telemetry(_) => "telemetry",
            Self::Bind { .. } => "bind",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// JSON error envelope for the server's own endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code/category.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ServerError::config("bad").category(), "config");
        assert_eq!(
            ServerError::from(AuthzError::config("no authorizer")).category(),
            "authz"
        );

        let err = ServerError::bind(
            "0.0.0.0:9091",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert_eq!(err.category(), "bind");
        assert!(err.to_string().contains("0.0.0.0:9091"));
    }

    #[test]
    fn test_error_response() {
        let resp = ErrorResponse::new("Not Found", "no route").with_request_id("req-123");
        assert_eq!(resp.to_string(), "[Not Found] no route");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["request_id"], "req-123");

        let bare = serde_json::to_value(ErrorResponse::new("a", "b")).unwrap();
        assert!(bare.get("request_id").is_none());
    }
}
