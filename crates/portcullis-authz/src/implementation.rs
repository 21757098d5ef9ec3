//! Proxy integrations.

use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use portcullis_core::{Authn, Object};
use url::Url;

use crate::resolvers::{AuthRequestObjectResolver, ForwardAuthObjectResolver};
use crate::response::AuthzResponse;
use crate::traits::ObjectResolver;

/// How the proxy talks to the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    /// Traefik / Caddy style: the proxy follows redirects returned by the
    /// endpoint.
    ForwardAuth,
    /// NGINX `auth_request` style: only 2xx, 401 and 403 are understood,
    /// so redirects travel in the `Location` header of a 401.
    AuthRequest,
}

impl Implementation {
    /// Stable name used in logs and metrics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ForwardAuth => "forward_auth",
            Self::AuthRequest => "auth_request",
        }
    }

    /// The object resolver matching the proxy's headers.
    pub fn object_resolver(&self) -> Arc<dyn ObjectResolver> {
        match self {
            Self::ForwardAuth => Arc::new(ForwardAuthObjectResolver),
            Self::AuthRequest => Arc::new(AuthRequestObjectResolver),
        }
    }

    /// Generic unauthorized response, used when no strategy owns it.
    pub fn unauthorized_response(&self, authn: &Authn, redirect_url: Option<&Url>) -> AuthzResponse {
        let Some(location) = redirect_url else {
            return AuthzResponse::unauthorized();
        };

        match self {
            Self::ForwardAuth => {
                let method = authn.object.as_ref().map_or("", Object::method);
                AuthzResponse::redirect(redirect_status(method), location)
            }
            Self::AuthRequest => AuthzResponse::redirect(StatusCode::UNAUTHORIZED, location),
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// 303 makes the client follow up with a GET.
fn redirect_status(method: &str) -> StatusCode {
    let safe = method.is_empty()
        || [Method::GET, Method::HEAD, Method::OPTIONS]
            .iter()
            .any(|m| m.as_str().eq_ignore_ascii_case(method));

    if safe {
        StatusCode::FOUND
    } else {
        StatusCode::SEE_OTHER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::AuthnType;

    fn authn(method: &str) -> Authn {
        let mut authn = Authn::anonymous(AuthnType::None);
        authn.attach(Object::parse("https://app.example.com/", method).unwrap());
        authn
    }

    fn portal() -> Url {
        Url::parse("https://auth.example.com/?rd=https%3A%2F%2Fapp.example.com%2F").unwrap()
    }

    #[test]
    fn test_names() {
        assert_eq!(Implementation::ForwardAuth.name(), "forward_auth");
        assert_eq!(Implementation::AuthRequest.to_string(), "auth_request");
    }

    #[test]
    fn test_forward_auth_safe_methods_found() {
        for method in ["GET", "HEAD", "OPTIONS", ""] {
            let response =
                Implementation::ForwardAuth.unauthorized_response(&authn(method), Some(&portal()));
            assert_eq!(response.status(), StatusCode::FOUND, "method {method:?}");
            assert_eq!(response.location(), Some(portal().as_str()));
        }
    }

    #[test]
    fn test_forward_auth_unsafe_methods_see_other() {
        for method in ["POST", "PUT", "DELETE", "PATCH"] {
            let response =
                Implementation::ForwardAuth.unauthorized_response(&authn(method), Some(&portal()));
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "method {method}");
        }
    }

    #[test]
    fn test_forward_auth_without_portal() {
        let response = Implementation::ForwardAuth.unauthorized_response(&authn("GET"), None);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.location().is_none());
    }

    #[test]
    fn test_auth_request_always_401() {
        let with = Implementation::AuthRequest.unauthorized_response(&authn("POST"), Some(&portal()));
        assert_eq!(with.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(with.location(), Some(portal().as_str()));

        let without = Implementation::AuthRequest.unauthorized_response(&authn("GET"), None);
        assert_eq!(without.status(), StatusCode::UNAUTHORIZED);
        assert!(without.location().is_none());
    }
}
