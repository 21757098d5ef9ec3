//! Routing tests for the Portcullis server.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use portcullis_config::{ConfigLoader, PortcullisConfig};
use portcullis_server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CONFIG: &str = r#"
[server]
request_timeout = "2s"

[[domains]]
name = "example.com"
portal_url = "https://auth.example.com"

[authn]
strategies = ["bearer_token", "trusted_header"]

[authn.bearer_token]
realm = "portcullis"
challenge = false

[[authn.bearer_token.tokens]]
token = "s3cr3t"
username = "ci"
groups = ["automation"]

[policy]
default = "one_factor"

[[policy.rules]]
domains = ["public.example.com"]
policy = "bypass"
"#;

fn config() -> PortcullisConfig {
    ConfigLoader::new()
        .with_string(CONFIG, "toml")
        .unwrap()
        .load()
        .unwrap()
}

fn server() -> Server {
    tokio_test::assert_ok!(Server::new(config()))
}

fn peer() -> SocketAddr {
    "10.0.0.1:40000".parse().unwrap()
}

fn forward_auth(host: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .uri("/api/authz/forward-auth")
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", host)
        .header("x-forwarded-uri", uri)
}

async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_forward_auth_redirects_anonymous() {
    let response = server()
        .handle(
            forward_auth("app.example.com", "/secret").body(()).unwrap(),
            peer(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"],
        "https://auth.example.com/?rd=https%3A%2F%2Fapp.example.com%2Fsecret"
    );
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_forward_auth_bypass_rule() {
    let response = server()
        .handle(
            forward_auth("public.example.com", "/").body(()).unwrap(),
            peer(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forward_auth_bearer_token() {
    let response = server()
        .handle(
            forward_auth("app.example.com", "/")
                .header("authorization", "Bearer s3cr3t")
                .body(())
                .unwrap(),
            peer(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["remote-user"], "ci");
    assert_eq!(response.headers()["remote-groups"], "automation");
}

#[tokio::test]
async fn test_forward_auth_trusted_header() {
    let response = server()
        .handle(
            forward_auth("app.example.com", "/")
                .header("remote-user", "john")
                .body(())
                .unwrap(),
            peer(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["remote-user"], "john");
}

#[tokio::test]
async fn test_forward_auth_unknown_token_is_generic_401() {
    let response = server()
        .handle(
            forward_auth("app.example.com", "/")
                .header("authorization", "Bearer nope")
                .body(())
                .unwrap(),
            peer(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key("location"));
}

#[tokio::test]
async fn test_forward_auth_unprotected_domain() {
    let response = server()
        .handle(forward_auth("other.com", "/").body(()).unwrap(), peer())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key("location"));
}

#[tokio::test]
async fn test_auth_request_returns_401_with_location() {
    let request = Request::builder()
        .uri("/api/authz/auth-request")
        .header("x-original-url", "https://app.example.com/secret")
        .header("x-original-method", "GET")
        .body(())
        .unwrap();

    let response = server().handle(request, peer()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["location"],
        "https://auth.example.com/?rd=https%3A%2F%2Fapp.example.com%2Fsecret&rm=GET"
    );
}

#[tokio::test]
async fn test_unbounded_request_timeout() {
    let config = ConfigLoader::new()
        .with_string(
            &CONFIG.replace("request_timeout = \"2s\"", "request_timeout = \"5124095576030431h\""),
            "toml",
        )
        .unwrap()
        .load()
        .unwrap();
    let server = tokio_test::assert_ok!(Server::new(config));

    let response = server
        .handle(
            forward_auth("app.example.com", "/secret").body(()).unwrap(),
            peer(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let request = forward_auth("public.example.com", "/")
        .header("x-request-id", "req-abc")
        .body(())
        .unwrap();

    let response = server().handle(request, peer()).await;
    assert_eq!(response.headers()["x-request-id"], "req-abc");
}

#[tokio::test]
async fn test_health_endpoint() {
    let request = Request::builder()
        .uri("/_portcullis/health")
        .body(())
        .unwrap();

    let response = server().handle(request, peer()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], portcullis_server::VERSION);
}

#[tokio::test]
async fn test_ready_endpoint_follows_listener() {
    let server = server();
    let ready = || Request::builder().uri("/_portcullis/ready").body(()).unwrap();

    let response = server.handle(ready(), peer()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.health().set_ready(true);
    let response = server.handle(ready(), peer()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ready");
}

#[tokio::test]
async fn test_version_endpoint() {
    let request = Request::builder()
        .uri("/_portcullis/version")
        .body(())
        .unwrap();

    let json = body_json(server().handle(request, peer()).await).await;
    assert_eq!(json["name"], "portcullis");
    assert_eq!(json["version"], portcullis_server::VERSION);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    portcullis_telemetry::init_metrics(true).unwrap();
    let server = server();

    server
        .handle(forward_auth("app.example.com", "/").body(()).unwrap(), peer())
        .await;

    let request = Request::builder()
        .uri("/_portcullis/metrics")
        .body(())
        .unwrap();
    let response = server.handle(request, peer()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let text = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&text).contains("portcullis_authz_decisions_total"));
}

#[tokio::test]
async fn test_unknown_routes_are_404_json() {
    for path in ["/nope", "/_portcullis/nope"] {
        let request = Request::builder()
            .uri(path)
            .header("x-request-id", "req-404")
            .body(())
            .unwrap();

        let response = server().handle(request, peer()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");

        let json = body_json(response).await;
        assert_eq!(json["error"], "Not Found");
        assert_eq!(json["request_id"], "req-404");
    }
}

#[tokio::test]
async fn test_serve_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::new(server()).serve(listener));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /_portcullis/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);

    assert!(text.starts_with("HTTP/1.1 200 OK"), "{text}");
    assert!(text.contains("\"healthy\""));
}
