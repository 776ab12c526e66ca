//! Test: proxied provider discovery through the gateway
//!
//! The upstream authority is only reachable on an internal address; the
//! gateway must publish it under its public issuer URL.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use mcpgate_gateway::{GatewayConfig, GatewayServer, ProxiedProvider};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{json_body, send};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUBLIC_ISSUER: &str = "https://login.example.com/realms/mcp";

fn discovery_document(internal: &str) -> serde_json::Value {
    json!({
        "issuer": PUBLIC_ISSUER,
        "authorization_endpoint": format!("{}/protocol/openid-connect/auth", PUBLIC_ISSUER),
        "token_endpoint": format!("{}/protocol/openid-connect/token", internal),
        "jwks_uri": format!("{}/protocol/openid-connect/certs", internal),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code"],
        "code_challenge_methods_supported": ["S256"],
    })
}

fn gateway(internal: &str) -> GatewayServer {
    let provider = ProxiedProvider::new(
        Url::parse(PUBLIC_ISSUER).unwrap(),
        Url::parse(internal).unwrap(),
        "mcp-gateway",
    );
    GatewayServer::new(GatewayConfig::default(), Arc::new(provider))
}

#[tokio::test]
async fn test_metadata_is_published_under_public_issuer() {
    let upstream = MockServer::start().await;
    let internal = format!("{}/realms/mcp", upstream.uri());

    Mock::given(method("GET"))
        .and(path("/realms/mcp/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&internal)))
        .expect(1)
        .mount(&upstream)
        .await;

    let router = gateway(&internal).router();
    for _ in 0..2 {
        let request = Request::get("/.well-known/oauth-authorization-server")
            .body(Body::empty())
            .unwrap();
        let response = send(&router, request).await;
        assert_eq!(response.status(), 200);

        let body = json_body(response).await;
        assert_eq!(body["issuer"], PUBLIC_ISSUER);
        assert_eq!(
            body["token_endpoint"],
            format!("{}/protocol/openid-connect/token", PUBLIC_ISSUER)
        );
        assert_eq!(
            body["jwks_uri"],
            format!("{}/protocol/openid-connect/certs", PUBLIC_ISSUER)
        );
        assert!(body.get("registration_endpoint").is_none());
    }
}

#[tokio::test]
async fn test_unreachable_authority_is_bad_gateway() {
    let upstream = MockServer::start().await;
    let internal = format!("{}/realms/mcp", upstream.uri());

    Mock::given(method("GET"))
        .and(path("/realms/mcp/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let router = gateway(&internal).router();
    let request = Request::get("/.well-known/oauth-authorization-server")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn test_protected_resource_names_public_issuer() {
    let router = gateway("http://keycloak.internal:8080/realms/mcp").router();

    let request = Request::get("/.well-known/oauth-protected-resource")
        .header("host", "localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        json_body(response).await["authorization_servers"],
        json!([PUBLIC_ISSUER])
    );
}
