//! Test: session lifecycle over the MCP endpoint
//!
//! Validates that:
//! 1. initialize creates exactly one session and returns its id
//! 2. requests on unknown sessions are rejected without touching the registry
//! 3. DELETE removes the session for good

use std::collections::HashSet;

use mcpgate_gateway::TransportState;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{initialize_session, json_body, requests, send, session_id_of, test_server, tokens};

#[tokio::test]
async fn test_initialize_then_hello() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();

    let response = send(&router, requests::post(Some(&token), None, &requests::initialize(0))).await;
    assert_eq!(response.status(), 200);
    let session_id = session_id_of(&response).expect("session header");

    let body = json_body(response).await;
    assert_eq!(body["id"], 0);
    assert_eq!(body["result"]["serverInfo"]["name"], "mcp-hello-world");
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");

    let session = server.sessions().lookup(&session_id).expect("registered");
    assert_eq!(session.transport().state(), TransportState::Active);
    assert_eq!(session.client_id(), tests::TEST_CLIENT);

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::hello(1, "Ada")),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(
        body["result"]["content"][0]["text"],
        "Hello, Ada! This is a response from the MCP Hello World server."
    );
}

#[tokio::test]
async fn test_tools_list_advertises_hello() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::rpc(2, "tools/list", json!({}))),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body = json_body(response).await;
    let tools = body["result"]["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "hello");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["name"]));
}

#[tokio::test]
async fn test_notification_is_accepted_without_reply() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = send(&router, requests::post(Some(&token), Some(&session_id), &initialized)).await;
    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn test_post_without_session_is_rejected() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();

    let response = send(&router, requests::post(Some(&token), None, &requests::hello(7, "Ada"))).await;
    assert_eq!(response.status(), 400);

    let body = json_body(response).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 7);
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(
        body["error"]["message"],
        "Bad request: expected initialize request without session ID"
    );
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_rejected_on_every_method() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let existing = initialize_session(&router, &token).await;
    let unknown = "00000000-0000-4000-8000-000000000000";

    let response = send(
        &router,
        requests::post(Some(&token), Some(unknown), &requests::hello(1, "Ada")),
    )
    .await;
    assert_eq!(response.status(), 400);

    let response = send(&router, requests::get(Some(&token), Some(unknown))).await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Invalid or missing session ID" })
    );

    let response = send(&router, requests::delete(Some(&token), Some(unknown))).await;
    assert_eq!(response.status(), 400);

    let response = send(&router, requests::delete(Some(&token), None)).await;
    assert_eq!(response.status(), 400);

    assert_eq!(server.sessions().len(), 1);
    assert!(server.sessions().lookup(&existing).is_some());
}

#[tokio::test]
async fn test_initialize_with_session_header_is_rejected() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let existing = initialize_session(&router, &token).await;

    let response = send(
        &router,
        requests::post(Some(&token), Some(&existing), &requests::initialize(3)),
    )
    .await;
    assert_eq!(response.status(), 400);
    assert!(session_id_of(&response).is_none());
    assert_eq!(server.sessions().len(), 1);
}

#[tokio::test]
async fn test_delete_terminates_session() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;
    let transport = server
        .sessions()
        .lookup(&session_id)
        .expect("registered")
        .transport()
        .clone();

    let response = send(&router, requests::delete(Some(&token), Some(&session_id))).await;
    assert_eq!(response.status(), 200);
    assert!(server.sessions().is_empty());
    assert_eq!(transport.state(), TransportState::Closed);

    // Gone for every verb afterwards
    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::hello(1, "Ada")),
    )
    .await;
    assert_eq!(response.status(), 400);
    let response = send(&router, requests::delete(Some(&token), Some(&session_id))).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_concurrent_initialize_yields_distinct_sessions() {
    const CLIENTS: usize = 32;

    let server = test_server();
    let router = server.router();
    let token = tokens::valid();

    let handles: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let router = router.clone();
            let token = token.clone();
            tokio::spawn(async move { initialize_session(&router, &token).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), CLIENTS);
    assert_eq!(server.sessions().len(), CLIENTS);
    for id in &ids {
        assert!(server.sessions().lookup(id).is_some());
    }
}

#[tokio::test]
async fn test_invalid_initialize_params_create_no_session() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();

    let body = requests::rpc(0, "initialize", json!("not-an-object"));
    let response = send(&router, requests::post(Some(&token), None, &body)).await;
    assert_eq!(response.status(), 200);
    assert!(session_id_of(&response).is_none());

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32602);
    assert!(server.sessions().is_empty());
}
