//! # Portcullis Config
//!
//! Typed configuration for the Portcullis forward-auth service.
//!
//! Configuration is layered: built-in defaults, then a TOML or JSON file,
//! then `PORTCULLIS__SECTION__KEY` environment variables, then validation.
//!
//! ```
//! use portcullis_config::ConfigLoader;
//!
//! let toml = r#"
//!     [[domains]]
//!     name = "example.com"
//!     portal_url = "https://auth.example.com"
//! "#;
//!
//! let config = ConfigLoader::new()
//!     .with_string(toml, "toml")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! assert_eq!(config.domains.len(), 1);
//! ```
//!
//! # Domain order
//!
//! `domains` is an ordered list and the first entry whose name is a
//! suffix of the requested host wins. Order is part of the contract; set
//! `domain_policy.reject_overlapping` to refuse configurations where the
//! order would matter.

#![doc(html_root_url = "https://docs.rs/portcullis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    AuthnConfig, BearerTokenConfig, DomainConfig, DomainPolicyConfig,
    LogFormat, LoggingConfig, MetricsConfig, PolicyConfig, PortcullisConfig, RuleConfig,
    ServerConfig, StrategyKind, TelemetryConfig, TokenConfig, TrustedHeaderConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
