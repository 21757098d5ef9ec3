//! Static bearer tokens.

use std::fmt;

use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::StatusCode;
use portcullis_core::{AuthenticationLevel, Authn, AuthnType, AuthzError, AuthzResult, Details};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use url::Url;

use crate::context::RequestContext;
use crate::response::AuthzResponse;
use crate::traits::{AuthnStrategy, BoxFuture};

struct Grant {
    digest: [u8; 32],
    details: Details,
    level: AuthenticationLevel,
}

/// Authenticates `Authorization: Bearer <token>` against a fixed table.
///
/// Requests without an `Authorization` header, or with a different scheme,
/// are anonymous. A bearer credential that is empty or unknown is an error.
/// Only SHA-256 digests of the tokens are kept, and a presented token is
/// compared against every digest in constant time.
/// With `challenge` enabled the strategy owns the unauthorized response and
/// answers with a `WWW-Authenticate` challenge instead of a portal redirect.
pub struct BearerTokenStrategy {
    realm: String,
    challenge: bool,
    tokens: Vec<Grant>,
}

impl fmt::Debug for BearerTokenStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenStrategy")
            .field("realm", &self.realm)
            .field("challenge", &self.challenge)
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl BearerTokenStrategy {
    /// Creates a strategy with no tokens.
    pub fn new(realm: impl Into<String>, challenge: bool) -> Self {
        Self {
            realm: realm.into(),
            challenge,
            tokens: Vec::new(),
        }
    }

    /// Accepts `token` as `details` at `level`.
    #[must_use]
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        details: Details,
        level: AuthenticationLevel,
    ) -> Self {
        let token: String = token.into();
        let digest = token_digest(&token);
        self.tokens.retain(|grant| grant.digest != digest);
        self.tokens.push(Grant {
            digest,
            details,
            level,
        });
        self
    }

    fn identify(&self, ctx: &RequestContext) -> AuthzResult<Authn> {
        let Some(raw) = ctx.headers().get(AUTHORIZATION) else {
            return Ok(Authn::anonymous(self.kind()));
        };

        let value = raw
            .to_str()
            .map_err(|_| self.error("authorization header is not valid text"))?
            .trim();

        let (scheme, credential) = value.split_once(' ').unwrap_or((value, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Ok(Authn::anonymous(self.kind()));
        }

        let token = credential.trim();
        if token.is_empty() {
            return Err(self.error("bearer token is empty"));
        }

        let presented = token_digest(token);
        let grant = self
            .tokens
            .iter()
            .fold(None, |found, grant| {
                if bool::from(grant.digest[..].ct_eq(&presented[..])) {
                    Some(grant)
                } else {
                    found
                }
            })
            .ok_or_else(|| self.error("bearer token is not recognised"))?;

        Ok(Authn::authenticated(
            self.kind(),
            grant.level,
            grant.details.clone(),
        ))
    }

    fn error(&self, message: &str) -> AuthzError {
        AuthzError::authentication(self.kind(), message)
    }
}

fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

impl AuthnStrategy for BearerTokenStrategy {
    fn kind(&self) -> AuthnType {
        AuthnType::BearerToken
    }

    fn get<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Authn>> {
        Box::pin(async move { self.identify(ctx) })
    }

    fn can_handle_unauthorized(&self) -> bool {
        self.challenge
    }

    fn handle_unauthorized(
        &self,
        _ctx: &RequestContext,
        _authn: &Authn,
        _redirect_url: Option<&Url>,
    ) -> AuthzResponse {
        AuthzResponse::new(StatusCode::UNAUTHORIZED)
            .with_header(WWW_AUTHENTICATE, &format!("Bearer realm=\"{}\"", self.realm))
    }
}
