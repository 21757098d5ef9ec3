//! Resource and caller descriptors.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthzError, AuthzResult};

/// URL schemes that can safely carry a session credential.
pub const SECURE_SCHEMES: &[&str] = &["https", "wss"];

/// The resource a request is trying to reach.
///
/// Resolved once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    url: Url,
    domain: String,
    method: String,
}

impl Object {
    /// Creates an object from an absolute URL and an HTTP method.
    ///
    /// The domain is the lower-cased host of the URL. The method may be
    /// empty when the proxy did not forward it.
    pub fn new(url: Url, method: impl Into<String>) -> AuthzResult<Self> {
        let domain = url
            .host_str()
            .map(str::to_ascii_lowercase)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                AuthzError::object_resolution(format!("target URL '{url}' has no host"))
            })?;

        Ok(Self {
            url,
            domain,
            method: method.into().trim().to_ascii_uppercase(),
        })
    }

    /// Parses an absolute URL string and builds an object from it.
    pub fn parse(url: &str, method: impl Into<String>) -> AuthzResult<Self> {
        let url = Url::parse(url).map_err(|e| {
            AuthzError::object_resolution(format!("failed to parse target URL '{url}': {e}"))
        })?;
        Self::new(url, method)
    }

    /// The absolute target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host used for domain and policy matching.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// HTTP method, empty when unknown.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether the target URL uses a secure scheme.
    pub fn is_secure(&self) -> bool {
        is_uri_secure(&self.url)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.method.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{} {}", self.method, self.url)
        }
    }
}

/// Identity snapshot handed to the policy evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Username, empty for anonymous callers.
    pub username: String,
    /// Groups the caller belongs to.
    pub groups: Vec<String>,
    /// Network address of the caller.
    pub ip: IpAddr,
}

impl Subject {
    /// Creates a subject.
    pub fn new(username: impl Into<String>, groups: Vec<String>, ip: IpAddr) -> Self {
        Self {
            username: username.into(),
            groups,
            ip,
        }
    }

    /// Whether no identity was established.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }

    /// Whether the subject is a member of `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Scheme guard: true when `url` can carry a session credential.
pub fn is_uri_secure(url: &Url) -> bool {
    SECURE_SCHEMES.contains(&url.scheme())
}

/// Whether `domain` is `suffix` itself or one of its subdomains.
///
/// Matching is case-insensitive and respects label boundaries, so
/// `example.com` covers `app.example.com` but not `badexample.com`.
/// An empty suffix matches nothing.
pub fn is_domain_suffix(domain: &str, suffix: &str) -> bool {
    let suffix = suffix.trim_start_matches('.');
    if suffix.is_empty() || domain.len() < suffix.len() {
        return false;
    }

    let split = domain.len() - suffix.len();
    if !domain.is_char_boundary(split) || !domain[split..].eq_ignore_ascii_case(suffix) {
        return false;
    }

    split == 0 || domain.as_bytes()[split - 1] == b'.'
}

/// Renders an HTTP method for display in logs and portal pages.
pub fn friendly_method(method: &str) -> String {
    match method.trim() {
        "" => "unknown".to_string(),
        m => m.to_ascii_uppercase(),
    }
}
