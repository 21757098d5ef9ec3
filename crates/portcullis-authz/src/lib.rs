//! # Portcullis Authz
//!
//! The forward-auth decision pipeline.
//!
//! A reverse proxy asks this crate, once per request, whether the request
//! may pass. The answer is always exactly one of:
//!
//! - `200 OK` with identity headers (authorized)
//! - `403 Forbidden` (identified and refused)
//! - an unauthorized response, optionally redirecting to the login portal
//!
//! ## Collaborators
//!
//! The pipeline talks to the outside world only through traits in
//! [`traits`]:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`ObjectResolver`] | Which resource the request targets |
//! | [`PortalUrlResolver`] | Portal URL for single-domain setups without a static one |
//! | [`AuthnStrategy`] | One link of the authentication chain |
//! | [`Authorizer`] | Required level for a subject and object |
//!
//! Every collaborator call is awaited under the request deadline carried
//! by [`RequestContext`].
//!
//! ## Example
//!
//! ```ignore
//! use portcullis_authz::{Authz, Implementation, PortalRoute, StaticAuthorizer};
//!
//! let authz = Authz::builder(Implementation::ForwardAuth)
//!     .route(PortalRoute::new("example.com", Some(portal_url)))
//!     .authorizer(Arc::new(StaticAuthorizer::new(RequiredLevel::TwoFactor)))
//!     .build()?;
//!
//! let response = authz.handle(&ctx).await;
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-authz/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod authorizer;
pub mod authz;
pub mod chain;
pub mod context;
pub mod implementation;
pub mod portal;
pub mod redirect;
pub mod resolvers;
pub mod response;
pub mod strategies;
pub mod traits;

pub use authorizer::{AccessRule, StaticAuthorizer, SubjectMatcher};
pub use authz::{Authz, AuthzBuilder, Decision};
pub use chain::{AuthnChain, ChainOutcome};
pub use context::RequestContext;
pub use implementation::Implementation;
pub use portal::{PortalResolver, PortalRoute};
pub use redirect::{redirection_url, QUERY_RD, QUERY_RM};
pub use resolvers::{AuthRequestObjectResolver, ForwardAuthObjectResolver, HeaderPortalUrlResolver};
pub use response::AuthzResponse;
pub use strategies::{BearerTokenStrategy, TrustedHeaderStrategy};
pub use traits::{Authorizer, AuthnStrategy, BoxFuture, ObjectResolver, PolicyMatch, PortalUrlResolver};
