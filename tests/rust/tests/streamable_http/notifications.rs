//! Test: push stream delivery
//!
//! Validates that:
//! 1. GET on an established session opens an SSE stream
//! 2. Notifications emitted while handling a POST arrive on that stream
//! 3. DELETE or a dropped stream ends the session

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Response};
use http_body_util::BodyExt;
use mcpgate_gateway::TransportState;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tests::{initialize_session, json_body, requests, send, session_id_of, test_server, tokens};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Read SSE frames until a complete `message` event arrives
async fn next_message(body: &mut Body) -> Option<Value> {
    let mut buffer = String::new();
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, body.frame())
            .await
            .expect("push stream should produce a frame")?
            .expect("frame should be readable");
        let Ok(data) = frame.into_data() else {
            continue;
        };
        buffer.push_str(&String::from_utf8_lossy(&data));

        while let Some(end) = buffer.find("\n\n") {
            let event: String = buffer.drain(..end + 2).collect();
            if !event.lines().any(|line| line == "event: message") {
                continue;
            }
            let payload: String = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            return serde_json::from_str(&payload).ok();
        }
    }
}

async fn open_stream(router: &axum::Router, token: &str, session_id: &str) -> Response<Body> {
    let response = send(router, requests::get(Some(token), Some(session_id))).await;
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream")));
    assert_eq!(session_id_of(&response).as_deref(), Some(session_id));
    response
}

#[tokio::test]
async fn test_hello_logs_to_push_stream() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let stream = open_stream(&router, &token, &session_id).await;
    let mut body = stream.into_body();

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::hello(1, "Grace")),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert!(json_body(response).await.get("error").is_none());

    let notification = next_message(&mut body).await.expect("log notification");
    assert_eq!(notification["jsonrpc"], "2.0");
    assert_eq!(notification["method"], "notifications/message");
    assert_eq!(notification["params"]["level"], "info");
    assert_eq!(notification["params"]["logger"], "hello");
    assert_eq!(notification["params"]["data"], "Greeted Grace");
}

#[tokio::test]
async fn test_delete_ends_push_stream() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let stream = open_stream(&router, &token, &session_id).await;
    let mut body = stream.into_body();

    let response = send(&router, requests::delete(Some(&token), Some(&session_id))).await;
    assert_eq!(response.status(), 200);

    assert!(next_message(&mut body).await.is_none());
    assert!(server.sessions().lookup(&session_id).is_none());
}

#[tokio::test]
async fn test_second_stream_is_conflict() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let _first = open_stream(&router, &token, &session_id).await;

    let response = send(&router, requests::get(Some(&token), Some(&session_id))).await;
    assert_eq!(response.status(), 409);

    let session = server.sessions().lookup(&session_id).expect("still registered");
    assert!(session.transport().has_stream());
    assert_eq!(session.transport().state(), TransportState::Active);
}

#[tokio::test]
async fn test_dropped_stream_closes_session() {
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

    let stream = open_stream(&router, &token, &session_id).await;
    drop(stream);

    assert_eq!(transport.state(), TransportState::Closed);
    assert!(server.sessions().lookup(&session_id).is_none());

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::hello(1, "Ada")),
    )
    .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_hello_without_stream_still_replies() {
    let server = test_server();
    let router = server.router();
    let token = tokens::valid();
    let session_id = initialize_session(&router, &token).await;

    let response = send(
        &router,
        requests::post(Some(&token), Some(&session_id), &requests::hello(4, "Linus")),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        json_body(response).await["result"]["content"][0]["text"],
        "Hello, Linus! This is a response from the MCP Hello World server."
    );
}
