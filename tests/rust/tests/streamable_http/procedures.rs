//! Test: procedure dispatch over the MCP endpoint

use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{initialize_session, json_body, requests, send, test_server, tokens};

async fn call(method: &str, params: serde_json::Value) -> serde_json::Value {
    let router = test_server().router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::rpc(9, method, params)),
    )
    .await;
    assert_eq!(response.status(), 200);
    json_body(response).await
}

#[tokio::test]
async fn test_hello_requires_name() {
    let body = call("tools/call", json!({ "name": "hello", "arguments": {} })).await;
    assert_eq!(body["id"], 9);
    assert_eq!(body["error"]["code"], -32602);
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_hello_rejects_wrong_type() {
    let body = call("tools/call", json!({ "name": "hello", "arguments": { "name": 42 } })).await;
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let body = call("tools/call", json!({ "name": "goodbye", "arguments": {} })).await;
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_unknown_method_is_method_not_found() {
    let body = call("resources/list", json!({})).await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_hello_callable_by_name() {
    let body = call("hello", json!({ "name": "Ada" })).await;
    assert_eq!(
        body["result"]["content"][0]["text"],
        "Hello, Ada! This is a response from the MCP Hello World server."
    );
}

#[tokio::test]
async fn test_ping() {
    let body = call("ping", json!({})).await;
    assert_eq!(body["result"], json!({}));
}
