//! # Portcullis Core
//!
//! Core types for the Portcullis forward-auth decision pipeline.
//!
//! This crate provides the foundational types used by every other crate:
//!
//! - [`Object`] - The resource a request is trying to reach
//! - [`Subject`] - Identity snapshot of the caller handed to the policy evaluator
//! - [`AuthenticationLevel`] / [`RequiredLevel`] - What the caller holds and what a resource needs
//! - [`Authn`] - Per-request authentication envelope produced by a strategy
//! - [`Verdict`] and [`classify`] - The three-way decision engine
//! - [`AuthzError`] - Error taxonomy shared by the pipeline

#![doc(html_root_url = "https://docs.rs/portcullis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod authn;
mod error;
mod level;
mod object;
mod verdict;

pub use authn::{Authn, AuthnType, Details};
pub use error::{AuthzError, AuthzResult};
pub use level::{AuthenticationLevel, RequiredLevel};
pub use object::{friendly_method, is_domain_suffix, is_uri_secure, Object, Subject, SECURE_SCHEMES};
pub use verdict::{classify, Verdict};
