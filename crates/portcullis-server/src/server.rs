//! HTTP server.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use portcullis_authz::{Authz, Implementation, RequestContext};
use portcullis_config::PortcullisConfig;
use portcullis_telemetry::{record_request, render_metrics, InFlightGuard};
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::error::{ErrorResponse, ServerError, ServerResult};
use crate::health::HealthChecker;
use crate::wiring::build_authz;

/// Forward auth endpoint (Traefik, Caddy).
pub const FORWARD_AUTH_PATH: &str = "/api/authz/forward-auth";
/// `auth_request` endpoint (NGINX).
pub const AUTH_REQUEST_PATH: &str = "/api/authz/auth-request";

const INTERNAL_PREFIX: &str = "/_portcullis/";
const X_REQUEST_ID: &str = "x-request-id";

/// The Portcullis server.
///
/// Holds one pipeline per proxy integration. Everything is read-only once
/// constructed, so a single instance serves all connections.
#[derive(Debug)]
pub struct Server {
    config: Arc<PortcullisConfig>,
    forward_auth: Authz,
    auth_request: Authz,
    health: HealthChecker,
}

impl Server {
    /// Wires the pipelines from `config`.
    ///
    /// `config` is expected to be validated already.
    pub fn new(config: PortcullisConfig) -> ServerResult<Self> {
        let forward_auth = build_authz(&config, Implementation::ForwardAuth)?;
        let auth_request = build_authz(&config, Implementation::AuthRequest)?;
        let health = HealthChecker::new(config.domains.len(), config.authn.strategies.len());

        Ok(Self {
            config: Arc::new(config),
            forward_auth,
            auth_request,
            health,
        })
    }

    /// Health checker shared with the internal endpoints.
    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Address configured for the listener.
    pub fn listen_addr(&self) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self.config.server.listen_addr.parse().map_err(|e| {
            ServerError::config(format!(
                "invalid listen address '{}': {e}",
                self.config.server.listen_addr
            ))
        })?;

        Ok(SocketAddr::new(ip, self.config.server.listen_port))
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;

        Arc::new(self).serve(listener).await
    }

    /// Serves connections from an already bound listener until Ctrl-C.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> ServerResult<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, "Portcullis listening");
        self.health.set_ready(true);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(req, peer).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(error = %e, "connection error");
                }
            });
        }

        self.health.set_ready(false);
        Ok(())
    }

    /// Routes one request. The body is never read.
    pub async fn handle<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<Full<Bytes>> {
        let start = Instant::now();
        let (parts, _) = req.into_parts();
        let path = parts.uri.path().to_string();

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| Uuid::now_v7().to_string(), ToString::to_string);

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %parts.method,
            path = %path,
            peer = %peer,
        );

        async move {
            let (endpoint, mut response) = match path.as_str() {
                FORWARD_AUTH_PATH => ("forward_auth", self.authorize(&self.forward_auth, parts, peer).await),
                AUTH_REQUEST_PATH => ("auth_request", self.authorize(&self.auth_request, parts, peer).await),
                internal if internal.starts_with(INTERNAL_PREFIX) => {
                    ("internal", self.internal(internal, &request_id))
                }
                _ => (
                    "unknown",
                    error_response(StatusCode::NOT_FOUND, &format!("no route for {path}"), &request_id),
                ),
            };

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }

            let duration = start.elapsed();
            record_request(endpoint, response.status().as_u16(), duration);
            info!(
                endpoint,
                status = response.status().as_u16(),
                duration_ms = %duration.as_millis(),
                "request completed"
            );

            response
        }
        .instrument(span)
        .await
    }

    async fn authorize(
        &self,
        authz: &Authz,
        parts: http::request::Parts,
        peer: SocketAddr,
    ) -> Response<Full<Bytes>> {
        let _in_flight = InFlightGuard::new();

        let mut ctx = RequestContext::new(parts.method, parts.uri, parts.headers, peer.ip());
        // Timeouts too large to represent as an instant mean no deadline.
        if let Some(deadline) =
            tokio::time::Instant::now().checked_add(self.config.server.request_timeout)
        {
            ctx = ctx.with_deadline(deadline);
        }

        authz.handle(&ctx).await.into_http()
    }

    fn internal(&self, path: &str, request_id: &str) -> Response<Full<Bytes>> {
        match path {
            "/_portcullis/health" => json_response(StatusCode::OK, &self.health.liveness()),
            "/_portcullis/ready" => {
                let response = self.health.readiness();
                let status = if response.status.is_ready() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(status, &response)
            }
            "/_portcullis/version" => json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "name": "portcullis",
                    "version": crate::VERSION,
                }),
            ),
            "/_portcullis/metrics" => match render_metrics() {
                Some(text) => {
                    let mut response = Response::new(Full::new(Bytes::from(text)));
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; version=0.0.4"),
                    );
                    response
                }
                None => error_response(StatusCode::NOT_FOUND, "metrics are disabled", request_id),
            },
            _ => error_response(
                StatusCode::NOT_FOUND,
                &format!("unknown internal endpoint: {path}"),
                request_id,
            ),
        }
    }
}

/// Create a JSON response.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Create an error response.
fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse::new(status.canonical_reason().unwrap_or("error"), message)
        .with_request_id(request_id);

    json_response(status, &error)
}
