//! Portal resolution.
//!
//! Maps a resource's domain to the login portal responsible for it.
//! Routes are kept in declaration order and the first match wins, so the
//! order of the configured domains is part of the contract.

use std::sync::Arc;

use portcullis_core::{is_domain_suffix, AuthzError, AuthzResult, Object};
use tracing::debug;
use url::Url;

use crate::context::RequestContext;
use crate::traits::PortalUrlResolver;

/// A protected domain suffix and its portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRoute {
    /// Domain suffix covering the domain and its subdomains.
    pub name: String,
    /// Static portal URL. `None` means "resolve dynamically" or "no portal".
    pub portal_url: Option<Url>,
}

impl PortalRoute {
    /// Creates a route.
    pub fn new(name: impl Into<String>, portal_url: Option<Url>) -> Self {
        Self {
            name: name.into(),
            portal_url,
        }
    }

    /// Whether `domain` falls under this route.
    pub fn covers(&self, domain: &str) -> bool {
        !self.name.is_empty() && is_domain_suffix(domain, &self.name)
    }
}

/// Resolves the portal URL for a resource.
#[derive(Clone)]
pub struct PortalResolver {
    routes: Arc<[PortalRoute]>,
    dynamic: Option<Arc<dyn PortalUrlResolver>>,
}

impl std::fmt::Debug for PortalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalResolver")
            .field("routes", &self.routes)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}

impl PortalResolver {
    /// Creates a resolver over routes in match order.
    pub fn new(routes: Vec<PortalRoute>) -> Self {
        Self {
            routes: routes.into(),
            dynamic: None,
        }
    }

    /// Adds a dynamic resolver, consulted only in single-domain deployments
    /// whose route has no static portal URL.
    #[must_use]
    pub fn with_dynamic(mut self, resolver: Arc<dyn PortalUrlResolver>) -> Self {
        self.dynamic = Some(resolver);
        self
    }

    /// Configured routes.
    pub fn routes(&self) -> &[PortalRoute] {
        &self.routes
    }

    /// Resolves the portal URL for `object`.
    ///
    /// `Ok(None)` means the domain is protected but has no portal; an
    /// error means the domain is not protected at all.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        object: &Object,
    ) -> AuthzResult<Option<Url>> {
        match &*self.routes {
            [route] => self.resolve_single(ctx, object, route).await,
            routes => routes
                .iter()
                .find(|route| route.covers(object.domain()))
                .map(|route| {
                    debug!(domain = %object.domain(), route = %route.name, "matched protected domain");
                    route.portal_url.clone()
                })
                .ok_or_else(|| AuthzError::not_protected_domain(object.url().as_str())),
        }
    }

    async fn resolve_single(
        &self,
        ctx: &RequestContext,
        object: &Object,
        route: &PortalRoute,
    ) -> AuthzResult<Option<Url>> {
        let mut portal_url = route.portal_url.clone();

        if portal_url.is_none() {
            if let Some(dynamic) = &self.dynamic {
                portal_url = ctx.within("portal_resolution", dynamic.resolve(ctx)).await?;
            }
        }

        if route.covers(object.domain()) {
            Ok(portal_url)
        } else {
            Err(AuthzError::not_protected_domain(object.url().as_str()))
        }
    }
}
