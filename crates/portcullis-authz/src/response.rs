//! Responses returned to the proxy.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use portcullis_core::Authn;
use tracing::warn;
use url::Url;

/// Identity header: username.
pub const REMOTE_USER: &str = "remote-user";
/// Identity header: comma separated groups.
pub const REMOTE_GROUPS: &str = "remote-groups";
/// Identity header: display name.
pub const REMOTE_NAME: &str = "remote-name";
/// Identity header: primary email address.
pub const REMOTE_EMAIL: &str = "remote-email";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// The single observable result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl AuthzResponse {
    /// A response with a plain-text body naming the status.
    pub fn new(status: StatusCode) -> Self {
        let body = format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));

        Self {
            status,
            headers,
            body: Bytes::from(body.trim_end().to_string()),
        }
    }

    /// `403 Forbidden`. Never carries a redirect.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    /// `401 Unauthorized` without a location.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    /// A response with `Location` pointing at `location`.
    pub fn redirect(status: StatusCode, location: &Url) -> Self {
        Self::new(status).with_header(LOCATION, location.as_str())
    }

    /// `200 OK` with an empty body, carrying the caller's identity headers
    /// when authenticated.
    pub fn authorized(authn: &Authn) -> Self {
        let mut response = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        if !authn.is_authenticated() {
            return response;
        }

        let details = &authn.details;
        response = response.with_header(HeaderName::from_static(REMOTE_USER), &details.username);

        if !details.groups.is_empty() {
            response = response.with_header(
                HeaderName::from_static(REMOTE_GROUPS),
                &details.groups.join(","),
            );
        }
        if !details.display_name.is_empty() {
            response =
                response.with_header(HeaderName::from_static(REMOTE_NAME), &details.display_name);
        }
        if let Some(email) = details.emails.first() {
            response = response.with_header(HeaderName::from_static(REMOTE_EMAIL), email);
        }

        response
    }

    /// Sets a header, dropping values that are not valid header text.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => {
                warn!(header = %name, "dropping header with invalid value");
            }
        }
        self
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Converts into a hyper-compatible response.
    pub fn into_http(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
