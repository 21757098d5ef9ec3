//! Per-request context handed to every collaborator.

use std::future::Future;
use std::net::IpAddr;

use http::{HeaderMap, Method, Uri};
use portcullis_core::{AuthzError, AuthzResult};
use tokio::time::Instant;

/// Header listing the client and the proxies a request passed through.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Everything the pipeline knows about one inbound request.
///
/// Owned by the request task; collaborators only borrow it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_ip: IpAddr,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context for a request received from `remote_ip`.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, remote_ip: IpAddr) -> Self {
        Self {
            method,
            uri,
            headers,
            remote_ip,
            deadline: None,
        }
    }

    /// Bounds every collaborator call made for this request.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Method of the request the proxy sent us (not of the protected resource).
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URI of the request the proxy sent us.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Trimmed UTF-8 value of a header, `None` when absent or empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Address of the TCP peer (normally the proxy).
    pub fn remote_ip(&self) -> IpAddr {
        self.remote_ip
    }

    /// Address of the end client.
    ///
    /// The first parseable entry of `X-Forwarded-For`, falling back to the
    /// TCP peer.
    pub fn client_ip(&self) -> IpAddr {
        self.header(X_FORWARDED_FOR)
            .and_then(|list| {
                list.split(',')
                    .find_map(|entry| entry.trim().parse::<IpAddr>().ok())
            })
            .unwrap_or(self.remote_ip)
    }

    /// Deadline for collaborator calls, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Awaits `fut`, turning deadline expiry into [`AuthzError::Cancelled`].
    pub(crate) async fn within<T, F>(&self, stage: &'static str, fut: F) -> AuthzResult<T>
    where
        F: Future<Output = AuthzResult<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .unwrap_or_else(|_| Err(AuthzError::cancelled(stage))),
            None => fut.await,
        }
    }
}
