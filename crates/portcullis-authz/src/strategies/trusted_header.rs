//! Identity asserted by a trusted upstream.

use http::HeaderName;
use portcullis_core::{AuthenticationLevel, Authn, AuthnType, AuthzError, AuthzResult, Details};

use crate::context::RequestContext;
use crate::traits::{AuthnStrategy, BoxFuture};

/// Reads the username and groups from headers set by a trusted proxy.
///
/// The proxy must strip these headers from client traffic. This strategy
/// never owns the unauthorized response.
#[derive(Debug, Clone)]
pub struct TrustedHeaderStrategy {
    user_header: HeaderName,
    groups_header: HeaderName,
    level: AuthenticationLevel,
}

impl TrustedHeaderStrategy {
    /// Creates the strategy.
    ///
    /// # Errors
    ///
    /// Returns a config error for invalid header names.
    pub fn new(user_header: &str, groups_header: &str, level: AuthenticationLevel) -> AuthzResult<Self> {
        let parse = |name: &str| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AuthzError::config(format!("invalid header name '{name}': {e}")))
        };

        Ok(Self {
            user_header: parse(user_header)?,
            groups_header: parse(groups_header)?,
            level,
        })
    }

    fn identify(&self, ctx: &RequestContext) -> AuthzResult<Authn> {
        let Some(raw) = ctx.headers().get(&self.user_header) else {
            return Ok(Authn::anonymous(self.kind()));
        };

        let username = raw
            .to_str()
            .map_err(|_| {
                AuthzError::authentication(self.kind(), format!("header '{}' is not valid text", self.user_header))
            })?
            .trim();

        if username.is_empty() {
            return Ok(Authn::anonymous(self.kind()));
        }

        let groups = ctx
            .header(self.groups_header.as_str())
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Authn::authenticated(
            self.kind(),
            self.level,
            Details::user(username).with_groups(groups),
        ))
    }
}

impl AuthnStrategy for TrustedHeaderStrategy {
    fn kind(&self) -> AuthnType {
        AuthnType::TrustedHeader
    }

    fn get<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Authn>> {
        Box::pin(async move { self.identify(ctx) })
    }
}
