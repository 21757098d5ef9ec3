//! Liveness and readiness reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Health status of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Process is healthy.
    Healthy,
}

/// Readiness status of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Ready to answer authorization requests.
    Ready,
    /// Not ready.
    NotReady,
}

impl ReadinessStatus {
    /// Check if the server is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status.
    pub status: HealthStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Version information.
    pub version: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status.
    pub status: ReadinessStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Tracks process uptime and whether the listener is accepting.
#[derive(Debug)]
pub struct HealthChecker {
    start_time: Instant,
    ready: AtomicBool,
    domains: usize,
    strategies: usize,
}

impl HealthChecker {
    /// Create a checker for a pipeline protecting `domains` with
    /// `strategies` authentication strategies.
    pub fn new(domains: usize, strategies: usize) -> Self {
        Self {
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            domains,
            strategies,
        }
    }

    /// Mark the server as ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if the server is ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Get the uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Perform a liveness check.
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            checks: vec![CheckResult::pass("process").with_message("server is running")],
            uptime_seconds: self.uptime().as_secs(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Perform a readiness check.
    pub fn readiness(&self) -> ReadinessResponse {
        let mut checks = vec![CheckResult::pass("config").with_message(format!(
            "{} protected domain(s), {} strategy(ies)",
            self.domains, self.strategies
        ))];

        checks.push(if self.is_ready() {
            CheckResult::pass("listener")
        } else {
            CheckResult::fail("listener", "listener is not bound yet")
        });

        let status = if checks.iter().all(|c| c.passed) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };

        ReadinessResponse { status, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert!(ReadinessStatus::Ready.is_ready());
        assert!(!ReadinessStatus::NotReady.is_ready());
    }

    #[test]
    fn test_check_result() {
        let pass = CheckResult::pass("test");
        assert!(pass.passed);
        assert_eq!(pass.name, "test");

        let fail = CheckResult::fail("test", "error message");
        assert!(!fail.passed);
        assert_eq!(fail.message, Some("error message".to_string()));
    }

    #[test]
    fn test_liveness() {
        let checker = HealthChecker::new(1, 0);
        let response = checker.liveness();
        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.version, crate::VERSION);
    }

    #[test]
    fn test_readiness_follows_ready_flag() {
        let checker = HealthChecker::new(2, 1);
        assert_eq!(checker.readiness().status, ReadinessStatus::NotReady);

        checker.set_ready(true);
        let response = checker.readiness();
        assert_eq!(response.status, ReadinessStatus::Ready);
        assert!(response.checks.iter().all(|c| c.passed));

        checker.set_ready(false);
        assert!(!checker.is_ready());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&HealthChecker::new(1, 1).readiness()).unwrap();
        assert!(json.contains("not_ready"));
        assert!(json.contains("listener"));
    }
}
