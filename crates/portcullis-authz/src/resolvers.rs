//! Built-in object and portal URL resolvers.
//!
//! Each proxy integration describes the protected resource differently:
//!
//! | Integration | URL | Method |
//! |-------------|-----|--------|
//! | Forward auth (Traefik, Caddy) | `X-Forwarded-Proto` + `X-Forwarded-Host` + `X-Forwarded-URI` | `X-Forwarded-Method` |
//! | Auth request (NGINX) | `X-Original-URL` | `X-Original-Method` |

use portcullis_core::{is_uri_secure, AuthzError, AuthzResult, Object};
use url::Url;

use crate::context::RequestContext;
use crate::traits::{BoxFuture, ObjectResolver, PortalUrlResolver};

/// Scheme of the original request.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
/// Host of the original request.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
/// Path and query of the original request.
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";
/// Method of the original request.
pub const X_FORWARDED_METHOD: &str = "x-forwarded-method";
/// Full URL of the original request.
pub const X_ORIGINAL_URL: &str = "x-original-url";
/// Method of the original request.
pub const X_ORIGINAL_METHOD: &str = "x-original-method";
/// Portal URL supplied by the proxy.
pub const X_PORTCULLIS_URL: &str = "x-portcullis-url";

/// Resolves the object from `X-Forwarded-*` headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardAuthObjectResolver;

impl ForwardAuthObjectResolver {
    fn object(ctx: &RequestContext) -> AuthzResult<Object> {
        let proto = ctx
            .header(X_FORWARDED_PROTO)
            .ok_or_else(|| missing(X_FORWARDED_PROTO))?;
        let host = ctx
            .header(X_FORWARDED_HOST)
            .ok_or_else(|| missing(X_FORWARDED_HOST))?;
        let uri = ctx.header(X_FORWARDED_URI).unwrap_or("/");

        if !uri.starts_with('/') {
            return Err(AuthzError::object_resolution(format!(
                "header '{X_FORWARDED_URI}' must be an absolute path, got '{uri}'"
            )));
        }

        Object::parse(
            &format!("{}://{host}{uri}", proto.to_ascii_lowercase()),
            ctx.header(X_FORWARDED_METHOD).unwrap_or_default(),
        )
    }
}

impl ObjectResolver for ForwardAuthObjectResolver {
    fn resolve<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Object>> {
        Box::pin(async move { Self::object(ctx) })
    }
}

/// Resolves the object from `X-Original-URL` and `X-Original-Method`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequestObjectResolver;

impl AuthRequestObjectResolver {
    fn object(ctx: &RequestContext) -> AuthzResult<Object> {
        let url = ctx
            .header(X_ORIGINAL_URL)
            .ok_or_else(|| missing(X_ORIGINAL_URL))?;

        Object::parse(url, ctx.header(X_ORIGINAL_METHOD).unwrap_or_default())
    }
}

impl ObjectResolver for AuthRequestObjectResolver {
    fn resolve<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Object>> {
        Box::pin(async move { Self::object(ctx) })
    }
}

/// Reads the portal URL from the `X-Portcullis-URL` request header.
///
/// An absent header means "no portal". The URL must be absolute and use a
/// secure scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPortalUrlResolver;

impl HeaderPortalUrlResolver {
    fn portal_url(ctx: &RequestContext) -> AuthzResult<Option<Url>> {
        let Some(raw) = ctx.header(X_PORTCULLIS_URL) else {
            return Ok(None);
        };

        let url = Url::parse(raw).map_err(|e| {
            AuthzError::portal_resolution(format!("header '{X_PORTCULLIS_URL}' is not a URL: {e}"))
        })?;

        if !is_uri_secure(&url) {
            return Err(AuthzError::portal_resolution(format!(
                "portal URL '{url}' has an insecure scheme '{}'",
                url.scheme()
            )));
        }

        Ok(Some(url))
    }
}

impl PortalUrlResolver for HeaderPortalUrlResolver {
    fn resolve<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, AuthzResult<Option<Url>>> {
        Box::pin(async move { Self::portal_url(ctx) })
    }
}

fn missing(header: &str) -> AuthzError {
    AuthzError::object_resolution(format!("missing required header '{header}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, Method, Uri};
    use std::net::{IpAddr, Ipv4Addr};

    fn ctx(headers: &[(&'static str, &'static str)]) -> RequestContext {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(value));
        }
        RequestContext::new(
            Method::GET,
            Uri::from_static("/api/authz/forward-auth"),
            map,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        )
    }

    #[tokio::test]
    async fn test_forward_auth_object() {
        let ctx = ctx(&[
            (X_FORWARDED_PROTO, "HTTPS"),
            (X_FORWARDED_HOST, "App.Example.com"),
            (X_FORWARDED_URI, "/secret?a=1"),
            (X_FORWARDED_METHOD, "post"),
        ]);

        let object = ForwardAuthObjectResolver.resolve(&ctx).await.unwrap();
        assert_eq!(object.url().as_str(), "https://app.example.com/secret?a=1");
        assert_eq!(object.domain(), "app.example.com");
        assert_eq!(object.method(), "POST");
    }

    #[tokio::test]
    async fn test_forward_auth_defaults() {
        let ctx = ctx(&[(X_FORWARDED_PROTO, "https"), (X_FORWARDED_HOST, "app.example.com")]);

        let object = ForwardAuthObjectResolver.resolve(&ctx).await.unwrap();
        assert_eq!(object.url().as_str(), "https://app.example.com/");
        assert_eq!(object.method(), "");
    }

    #[tokio::test]
    async fn test_forward_auth_missing_headers() {
        let err = ForwardAuthObjectResolver
            .resolve(&ctx(&[(X_FORWARDED_HOST, "app.example.com")]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "object_resolution");
        assert!(err.to_string().contains(X_FORWARDED_PROTO));

        assert!(ForwardAuthObjectResolver
            .resolve(&ctx(&[(X_FORWARDED_PROTO, "https")]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_forward_auth_relative_uri_rejected() {
        let ctx = ctx(&[
            (X_FORWARDED_PROTO, "https"),
            (X_FORWARDED_HOST, "app.example.com"),
            (X_FORWARDED_URI, "@evil.com/"),
        ]);
        assert!(ForwardAuthObjectResolver.resolve(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_auth_request_object() {
        let ctx = ctx(&[
            (X_ORIGINAL_URL, "https://app.example.com/secret"),
            (X_ORIGINAL_METHOD, "DELETE"),
        ]);

        let object = AuthRequestObjectResolver.resolve(&ctx).await.unwrap();
        assert_eq!(object.url().as_str(), "https://app.example.com/secret");
        assert_eq!(object.method(), "DELETE");
    }

    #[tokio::test]
    async fn test_auth_request_invalid_url() {
        let err = AuthRequestObjectResolver
            .resolve(&ctx(&[(X_ORIGINAL_URL, "not a url")]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "object_resolution");

        assert!(AuthRequestObjectResolver.resolve(&ctx(&[])).await.is_err());
    }

    #[tokio::test]
    async fn test_header_portal_url() {
        let resolver = HeaderPortalUrlResolver;

        assert_eq!(resolver.resolve(&ctx(&[])).await.unwrap(), None);

        let url = resolver
            .resolve(&ctx(&[(X_PORTCULLIS_URL, "https://auth.example.com/")]))
            .await
            .unwrap();
        assert_eq!(url.map(String::from).as_deref(), Some("https://auth.example.com/"));

        let err = resolver
            .resolve(&ctx(&[(X_PORTCULLIS_URL, "http://auth.example.com/")]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "portal_resolution");
    }
}
