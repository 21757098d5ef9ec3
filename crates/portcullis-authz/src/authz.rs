//! Top-level orchestration.
//!
//! Each request moves through a fixed sequence of stages:
//!
//! 1. **Object** - resolve the target resource
//! 2. **Scheme guard** - reject targets that cannot carry a credential
//! 3. **Portal** - find the login portal for the target's domain
//! 4. **Authentication** - run the strategy chain
//! 5. **Policy** - ask the authorizer for the required level
//! 6. **Classify** - reduce to a [`Verdict`]
//! 7. **Dispatch** - turn the verdict into exactly one response
//!
//! Every error in stages 1 to 5 ends the request with the same generic
//! unauthorized response, so callers cannot tell which stage failed.

use std::fmt;
use std::sync::Arc;

use portcullis_core::{
    classify, Authn, AuthzError, AuthzResult, Object, RequiredLevel, Subject, Verdict,
};
use portcullis_telemetry::{record_authz_decision, record_authz_failure};
use tracing::{debug, error, info};
use url::Url;

use crate::chain::AuthnChain;
use crate::context::RequestContext;
use crate::implementation::Implementation;
use crate::portal::{PortalResolver, PortalRoute};
use crate::redirect::redirection_url;
use crate::response::AuthzResponse;
use crate::traits::{Authorizer, AuthnStrategy, ObjectResolver, PortalUrlResolver};

/// Everything the pipeline decided about one request.
///
/// Produced by [`Authz::decide`] and consumed once by [`Authz::dispatch`].
#[derive(Clone)]
pub struct Decision {
    /// The classification result.
    pub verdict: Verdict,
    /// Authentication state with the object attached.
    pub authn: Authn,
    /// Level the policy demanded.
    pub required: RequiredLevel,
    /// Where to send the caller to log in. Only set for unauthorized verdicts.
    pub redirect_url: Option<Url>,
    /// Strategy that owns the unauthorized response.
    pub owner: Option<Arc<dyn AuthnStrategy>>,
}

impl fmt::Debug for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decision")
            .field("verdict", &self.verdict)
            .field("authn", &self.authn)
            .field("required", &self.required)
            .field("redirect_url", &self.redirect_url.as_ref().map(Url::as_str))
            .field("owner", &self.owner.as_ref().map(|s| s.kind()))
            .finish()
    }
}

/// The authorization pipeline for one proxy integration.
///
/// Immutable after [`AuthzBuilder::build`]; share it behind an [`Arc`]
/// across all request tasks.
///
/// # Example
///
/// ```ignore
/// let authz = Authz::builder(Implementation::ForwardAuth)
///     .route(PortalRoute::new("example.com", Some(portal)))
///     .strategy(Arc::new(TrustedHeaderStrategy::new("Remote-User", "Remote-Groups", level)?))
///     .authorizer(Arc::new(StaticAuthorizer::new(RequiredLevel::TwoFactor)))
///     .build()?;
///
/// let response = authz.handle(&ctx).await;
/// ```
#[derive(Clone)]
pub struct Authz {
    implementation: Implementation,
    object_resolver: Arc<dyn ObjectResolver>,
    portal: PortalResolver,
    chain: AuthnChain,
    authorizer: Arc<dyn Authorizer>,
}

impl fmt::Debug for Authz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authz")
            .field("implementation", &self.implementation)
            .field("portal", &self.portal)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl Authz {
    /// Starts building a pipeline for `implementation`.
    #[must_use]
    pub fn builder(implementation: Implementation) -> AuthzBuilder {
        AuthzBuilder::new(implementation)
    }

    /// The proxy integration this pipeline serves.
    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Runs every stage up to and including classification.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a stage. Any error is terminal
    /// for the request.
    pub async fn decide(&self, ctx: &RequestContext) -> AuthzResult<Decision> {
        let object = self.resolve_object(ctx).await?;
        self.decide_object(ctx, &object).await
    }

    async fn resolve_object(&self, ctx: &RequestContext) -> AuthzResult<Object> {
        ctx.within("object_resolution", self.object_resolver.resolve(ctx))
            .await
    }

    async fn decide_object(&self, ctx: &RequestContext, object: &Object) -> AuthzResult<Decision> {
        if !object.is_secure() {
            return Err(AuthzError::insecure_scheme(
                object.url().as_str(),
                object.url().scheme(),
            ));
        }

        let portal_url = self.portal.resolve(ctx, object).await?;

        let outcome = self.chain.authenticate(ctx).await?;
        let mut authn = outcome.authn;
        authn.attach(object.clone());

        let subject = Subject::new(
            authn.details.username.clone(),
            authn.details.groups.clone(),
            ctx.client_ip(),
        );

        let policy = ctx
            .within("policy", async {
                Ok(self.authorizer.required_level(&subject, object).await)
            })
            .await?;

        let verdict = classify(authn.level, policy.required, policy.rule_has_subject);

        debug!(
            url = %object.url(),
            method = %authn.method,
            username = %authn.username(),
            level = %authn.level,
            required = %policy.required,
            rule_has_subject = policy.rule_has_subject,
            verdict = %verdict,
            "classified request"
        );

        let redirect_url = match verdict {
            Verdict::Unauthorized => redirection_url(object, portal_url.as_ref()),
            Verdict::Forbidden | Verdict::Authorized => None,
        };

        Ok(Decision {
            verdict,
            authn,
            required: policy.required,
            redirect_url,
            owner: outcome.owner,
        })
    }

    /// Produces the single response for a decision.
    pub fn dispatch(&self, ctx: &RequestContext, decision: &Decision) -> AuthzResponse {
        let authn = &decision.authn;

        match decision.verdict {
            Verdict::Forbidden => {
                info!(
                    username = %authn.username(),
                    url = %target(authn),
                    "access to resource is forbidden"
                );
                AuthzResponse::forbidden()
            }
            Verdict::Unauthorized => match &decision.owner {
                Some(owner) => {
                    debug!(
                        strategy = %owner.kind(),
                        url = %target(authn),
                        "unauthorized response handled by strategy"
                    );
                    owner.handle_unauthorized(ctx, authn, decision.redirect_url.as_ref())
                }
                None => self
                    .implementation
                    .unauthorized_response(authn, decision.redirect_url.as_ref()),
            },
            Verdict::Authorized => AuthzResponse::authorized(authn),
        }
    }

    /// Decides and dispatches one request.
    ///
    /// Never fails: errors are logged, counted and answered with a generic
    /// `401 Unauthorized` that carries no location.
    pub async fn handle(&self, ctx: &RequestContext) -> AuthzResponse {
        let object = match self.resolve_object(ctx).await {
            Ok(object) => object,
            Err(err) => return self.fail(&err, None),
        };

        match self.decide_object(ctx, &object).await {
            Ok(decision) => {
                record_authz_decision(decision.verdict.as_str());
                self.dispatch(ctx, &decision)
            }
            Err(err) => self.fail(&err, Some(object.url())),
        }
    }

    fn fail(&self, err: &AuthzError, target: Option<&Url>) -> AuthzResponse {
        self.log_failure(err, target);
        record_authz_failure(err.category());
        AuthzResponse::unauthorized()
    }

    fn log_failure(&self, err: &AuthzError, target: Option<&Url>) {
        match (err, target) {
            (AuthzError::InsecureScheme { url, scheme }, _) => error!(
                implementation = %self.implementation,
                url = %url,
                scheme = %scheme,
                "target URL has an insecure scheme"
            ),
            (_, Some(url)) => error!(
                implementation = %self.implementation,
                url = %url,
                category = err.category(),
                error = %err,
                "failed to authorize request"
            ),
            (_, None) => error!(
                implementation = %self.implementation,
                category = err.category(),
                error = %err,
                "failed to resolve target object"
            ),
        }
    }
}

fn target(authn: &Authn) -> &str {
    authn.object.as_ref().map_or("", |o| o.url().as_str())
}

/// Builder for [`Authz`].
pub struct AuthzBuilder {
    implementation: Implementation,
    object_resolver: Option<Arc<dyn ObjectResolver>>,
    routes: Vec<PortalRoute>,
    dynamic_portal: Option<Arc<dyn PortalUrlResolver>>,
    chain: AuthnChain,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl fmt::Debug for AuthzBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzBuilder")
            .field("implementation", &self.implementation)
            .field("routes", &self.routes)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl AuthzBuilder {
    fn new(implementation: Implementation) -> Self {
        Self {
            implementation,
            object_resolver: None,
            routes: Vec::new(),
            dynamic_portal: None,
            chain: AuthnChain::default(),
            authorizer: None,
        }
    }

    /// Replaces the implementation's default object resolver.
    #[must_use]
    pub fn object_resolver(mut self, resolver: Arc<dyn ObjectResolver>) -> Self {
        self.object_resolver = Some(resolver);
        self
    }

    /// Appends a protected domain. Order is match precedence.
    #[must_use]
    pub fn route(mut self, route: PortalRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Appends several protected domains.
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = PortalRoute>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Sets the dynamic portal URL resolver used by single-domain setups.
    #[must_use]
    pub fn dynamic_portal(mut self, resolver: Arc<dyn PortalUrlResolver>) -> Self {
        self.dynamic_portal = Some(resolver);
        self
    }

    /// Appends an authentication strategy. Order is precedence.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn AuthnStrategy>) -> Self {
        self.chain = self.chain.with(strategy);
        self
    }

    /// Replaces the whole authentication chain.
    #[must_use]
    pub fn chain(mut self, chain: AuthnChain) -> Self {
        self.chain = chain;
        self
    }

    /// Sets the policy evaluator.
    #[must_use]
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a config error when no domain or no authorizer was given.
    pub fn build(self) -> AuthzResult<Authz> {
        if self.routes.is_empty() {
            return Err(AuthzError::config("at least one protected domain is required"));
        }

        let authorizer = self
            .authorizer
            .ok_or_else(|| AuthzError::config("an authorizer is required"))?;

        let mut portal = PortalResolver::new(self.routes);
        if let Some(dynamic) = self.dynamic_portal {
            portal = portal.with_dynamic(dynamic);
        }

        Ok(Authz {
            object_resolver: self
                .object_resolver
                .unwrap_or_else(|| self.implementation.object_resolver()),
            implementation: self.implementation,
            portal,
            chain: self.chain,
            authorizer,
        })
    }
}
