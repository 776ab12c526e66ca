//! Test: bearer token enforcement
//!
//! Every rejected request answers 401 with an RFC 9728 challenge and leaves
//! the session registry untouched.

use axum::body::Body;
use axum::http::{header, Request, Response};
use mcpgate_gateway::TransportState;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{initialize_session, json_body, requests, send, test_server, tokens};

const RESOURCE_METADATA: &str = "http://localhost:3000/.well-known/oauth-protected-resource";

fn challenge(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .expect("WWW-Authenticate header")
        .to_string()
}

#[tokio::test]
async fn test_missing_token_gets_challenge() {
    let server = test_server();
    let router = server.router();

    let response = send(&router, requests::post(None, None, &requests::initialize(0))).await;
    assert_eq!(response.status(), 401);

    let challenge = challenge(&response);
    assert!(challenge.starts_with("Bearer realm=\"McpGate Gateway\""));
    assert!(challenge.contains("error=\"invalid_token\""));
    assert!(challenge.contains(&format!("resource_metadata=\"{}\"", RESOURCE_METADATA)));

    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_token");
    assert_eq!(body["resource_metadata"], RESOURCE_METADATA);
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn test_expired_token_creates_no_session() {
    let server = test_server();
    let router = server.router();
    let token = tokens::expired();

    let response = send(&router, requests::post(Some(&token), None, &requests::initialize(0))).await;
    assert_eq!(response.status(), 401);
    assert!(challenge(&response).contains("error=\"invalid_token\""));
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let server = test_server();
    let router = server.router();
    let token = tokens::wrong_signature();

    let response = send(&router, requests::post(Some(&token), None, &requests::initialize(0))).await;
    assert_eq!(response.status(), 401);
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn test_wrong_audience_and_issuer_are_rejected() {
    let server = test_server();
    let router = server.router();

    for token in [
        tokens::with_claims(json!({ "aud": "https://someone-else.example.com" })),
        tokens::with_claims(json!({ "iss": "https://evil.auth0.com/" })),
    ] {
        let response =
            send(&router, requests::post(Some(&token), None, &requests::initialize(0))).await;
        assert_eq!(response.status(), 401);
    }
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn test_non_bearer_scheme_is_invalid_request() {
    let server = test_server();
    let router = server.router();

    let request = Request::post("/mcp")
        .header(header::HOST, "localhost:3000")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::from(requests::initialize(0).to_string()))
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), 401);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_rejected_token_cannot_touch_existing_session() {
    let server = test_server();
    let router = server.router();
    let session_id = initialize_session(&router, &tokens::valid()).await;
    let expired = tokens::expired();

    let response = send(
        &router,
        requests::post(Some(&expired), Some(&session_id), &requests::hello(1, "Mallory")),
    )
    .await;
    assert_eq!(response.status(), 401);

    let response = send(&router, requests::get(Some(&expired), Some(&session_id))).await;
    assert_eq!(response.status(), 401);

    let response = send(&router, requests::delete(Some(&expired), Some(&session_id))).await;
    assert_eq!(response.status(), 401);

    let session = server.sessions().lookup(&session_id).expect("still registered");
    assert_eq!(session.transport().state(), TransportState::Active);
    assert!(!session.transport().has_stream());
}

#[tokio::test]
async fn test_discovery_routes_stay_public() {
    let router = test_server().router();

    for uri in [
        "/health",
        "/.well-known/oauth-protected-resource",
        "/.well-known/oauth-protected-resource/mcp",
        "/.well-known/oauth-authorization-server",
    ] {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let response = send(&router, request).await;
        assert_eq!(response.status(), 200, "{} should not require a token", uri);
    }
}
