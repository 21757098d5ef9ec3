//! # Portcullis Server
//!
//! HTTP front end for the Portcullis forward-auth decision pipeline.
//!
//! # Endpoints
//!
//! | Path | Purpose |
//! |------|---------|
//! | `/api/authz/forward-auth` | Traefik / Caddy forward auth |
//! | `/api/authz/auth-request` | NGINX `auth_request` |
//! | `/_portcullis/health` | Liveness |
//! | `/_portcullis/ready` | Readiness, 503 until the listener is bound |
//! | `/_portcullis/version` | Build version |
//! | `/_portcullis/metrics` | Prometheus metrics when enabled |
//!
//! # Example Usage
//!
//! ```bash
//! # Run with a configuration file
//! $ portcullis --config /etc/portcullis/portcullis.toml
//!
//! # Override settings from the environment
//! $ PORTCULLIS__SERVER__LISTEN_PORT=9092 portcullis --config portcullis.toml
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod health;
pub mod server;
pub mod wiring;

pub use error::{ErrorResponse, ServerError, ServerResult};
pub use health::{HealthChecker, HealthStatus, ReadinessStatus};
pub use server::Server;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
