//! Collaborator contracts consumed by the pipeline.
//!
//! Implementations may perform I/O (session stores, caches, remote policy
//! engines) and must be safe for concurrent use; the pipeline shares one
//! instance of each across all in-flight requests.

use std::future::Future;
use std::pin::Pin;

use portcullis_core::{Authn, AuthnType, AuthzResult, Object, RequiredLevel, Subject};
use url::Url;

use crate::context::RequestContext;
use crate::response::AuthzResponse;

/// A boxed future returned by collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Works out which resource a request targets.
pub trait ObjectResolver: Send + Sync + 'static {
    /// Resolves the target resource.
    fn resolve<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Object>>;
}

/// Supplies a portal URL at request time for single-domain deployments
/// without a static one.
pub trait PortalUrlResolver: Send + Sync + 'static {
    /// Resolves the portal URL; `Ok(None)` means "no portal".
    fn resolve<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Option<Url>>>;
}

/// Outcome of a policy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyMatch {
    /// Whether the deciding rule was scoped to this specific subject.
    pub rule_has_subject: bool,
    /// Level the resource requires.
    pub required: RequiredLevel,
}

impl PolicyMatch {
    /// Creates a policy match.
    pub const fn new(rule_has_subject: bool, required: RequiredLevel) -> Self {
        Self {
            rule_has_subject,
            required,
        }
    }
}

/// Policy evaluator.
pub trait Authorizer: Send + Sync + 'static {
    /// Returns the level `subject` needs to reach `object`.
    fn required_level<'a>(
        &'a self,
        subject: &'a Subject,
        object: &'a Object,
    ) -> BoxFuture<'a, PolicyMatch>;
}

/// One link of the authentication chain.
///
/// A strategy that returns `true` from [`can_handle_unauthorized`] takes
/// over the response whenever the request ends up unauthorized after it
/// was the last strategy consulted.
///
/// [`can_handle_unauthorized`]: AuthnStrategy::can_handle_unauthorized
pub trait AuthnStrategy: Send + Sync + 'static {
    /// Kind reported on results from this strategy.
    fn kind(&self) -> AuthnType;

    /// Establishes the caller's authentication state.
    ///
    /// Returns an anonymous result when the request carries nothing this
    /// strategy understands, and an error when it carries something invalid.
    fn get<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Authn>>;

    /// Whether this strategy produces its own unauthorized responses.
    fn can_handle_unauthorized(&self) -> bool {
        false
    }

    /// Produces the unauthorized response. Only called on owners.
    fn handle_unauthorized(
        &self,
        _ctx: &RequestContext,
        _authn: &Authn,
        _redirect_url: Option<&Url>,
    ) -> AuthzResponse {
        AuthzResponse::unauthorized()
    }
}
