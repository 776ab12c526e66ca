//! Shared test utilities and fixtures for McpGate integration tests.
//!
//! The gateway is driven in-process through `tower::ServiceExt::oneshot`, with
//! an Auth0 provider whose verifier trusts a fixed HS256 secret.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use mcpgate_core::branding;
use mcpgate_gateway::{Auth0Provider, GatewayConfig, GatewayServer, StaticKeyVerifier};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const TEST_DOMAIN: &str = "tenant.auth0.com";
pub const TEST_ISSUER: &str = "https://tenant.auth0.com/";
pub const TEST_AUDIENCE: &str = "https://api.mcpgate.test";
pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const TEST_CLIENT: &str = "integration-client";

/// Token minting
pub mod tokens {
    use super::*;

    /// Claims for a token that verifies against the test provider
    pub fn claims(expires_in_secs: i64) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": TEST_ISSUER,
            "aud": TEST_AUDIENCE,
            "sub": "auth0|integration",
            "azp": TEST_CLIENT,
            "scope": "openid profile",
            "iat": now,
            "exp": now + expires_in_secs,
        })
    }

    pub fn sign(claims: &Value, secret: &[u8]) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .expect("token should encode")
    }

    /// Valid for an hour
    pub fn valid() -> String {
        sign(&claims(3600), TEST_SECRET)
    }

    /// Expired well beyond the verifier's leeway
    pub fn expired() -> String {
        sign(&claims(-3600), TEST_SECRET)
    }

    /// Right claims, wrong key
    pub fn wrong_signature() -> String {
        sign(&claims(3600), b"some-other-secret")
    }

    pub fn with_claims(overrides: Value) -> String {
        let mut claims = claims(3600);
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        sign(&claims, TEST_SECRET)
    }
}

/// Gateway wired to the HS256 test provider
pub fn test_server() -> GatewayServer {
    test_server_with(GatewayConfig::default())
}

pub fn test_server_with(config: GatewayConfig) -> GatewayServer {
    let verifier = StaticKeyVerifier::hs256(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE);
    let provider = Auth0Provider::with_verifier(TEST_DOMAIN, Arc::new(verifier));
    GatewayServer::new(config, Arc::new(provider))
}

/// Request builders for the MCP endpoint
pub mod requests {
    use super::*;

    pub fn rpc(id: u64, method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    pub fn initialize(id: u64) -> Value {
        rpc(
            id,
            "initialize",
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "integration-tests", "version": "1.0.0" }
            }),
        )
    }

    pub fn hello(id: u64, name: &str) -> Value {
        rpc(
            id,
            "tools/call",
            json!({ "name": "hello", "arguments": { "name": name } }),
        )
    }

    pub fn post(token: Option<&str>, session: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::post(branding::DEFAULT_MCP_PATH)
            .header(header::HOST, "localhost:3000")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(session) = session {
            builder = builder.header(branding::SESSION_HEADER, session);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    pub fn get(token: Option<&str>, session: Option<&str>) -> Request<Body> {
        without_body(Request::get(branding::DEFAULT_MCP_PATH), token, session)
    }

    pub fn delete(token: Option<&str>, session: Option<&str>) -> Request<Body> {
        without_body(Request::delete(branding::DEFAULT_MCP_PATH), token, session)
    }

    fn without_body(
        mut builder: axum::http::request::Builder,
        token: Option<&str>,
        session: Option<&str>,
    ) -> Request<Body> {
        builder = builder
            .header(header::HOST, "localhost:3000")
            .header(header::ACCEPT, "text/event-stream");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(session) = session {
            builder = builder.header(branding::SESSION_HEADER, session);
        }
        builder.body(Body::empty()).expect("request should build")
    }
}

/// Send one request through a clone of the router
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub fn session_id_of(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(branding::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Run `initialize` and return the new session id
pub async fn initialize_session(router: &Router, token: &str) -> String {
    let response = send(router, requests::post(Some(token), None, &requests::initialize(0))).await;
    assert_eq!(response.status(), 200, "initialize should succeed");
    session_id_of(&response).expect("initialize should return a session id")
}
