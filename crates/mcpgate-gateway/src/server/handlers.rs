//! HTTP handlers for the gateway server

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::StreamExt;
use mcpgate_core::branding;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::AppState;
use crate::auth::{auth_error_response, AuthContext};
use crate::mcp::{negotiate_initialize, Envelope, ProtocolError, RpcReply, StreamError};
use crate::oauth::request_origin;

/// SSE keep-alive comment interval on push streams
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

const NEW_SESSION_REQUIRED: &str = "Bad request: expected initialize request without session ID";
const INVALID_SESSION: &str = "Invalid or missing session ID";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Protected resource metadata endpoint (RFC 9728)
pub async fn resource_metadata(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let origin = request_origin(&headers);
    debug!("[Gateway] Protected resource metadata request for {}", origin);
    Json(state.provider.protected_resource_metadata(&origin)).into_response()
}

/// Authorization server metadata endpoint (RFC 8414)
pub async fn authorization_server_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    match state.provider.authorization_server_metadata().await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(err) => {
            warn!("[Gateway] Authorization server metadata unavailable: {}", err);
            auth_error_response(&err, &request_origin(&headers))
        }
    }
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(branding::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn session_header_value(id: &str) -> Option<(HeaderName, HeaderValue)> {
    let value = HeaderValue::from_str(id).ok()?;
    Some((HeaderName::from_static(branding::SESSION_HEADER), value))
}

fn invalid_session() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": INVALID_SESSION })),
    )
        .into_response()
}

fn protocol_error(err: &ProtocolError) -> Response {
    (StatusCode::BAD_REQUEST, Json(err.reply())).into_response()
}

fn reply(reply: RpcReply) -> Response {
    (StatusCode::OK, Json(reply)).into_response()
}

/// `POST {mcp_path}`: one JSON-RPC turn
pub async fn mcp_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let envelope = match Envelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("[Gateway] Rejected envelope: {}", err);
            return protocol_error(&err);
        }
    };
    let session_id = session_header(&headers);

    if envelope.is_initialize() {
        if session_id.is_some() {
            return protocol_error(&ProtocolError::invalid(envelope.id(), NEW_SESSION_REQUIRED));
        }
        return initialize(&state, &auth, envelope);
    }

    let Some(session) = session_id.and_then(|id| state.sessions.lookup(id)) else {
        debug!(
            session_id = session_id.unwrap_or("-"),
            method = envelope.method().unwrap_or("-"),
            "[Gateway] Unknown or missing session"
        );
        return protocol_error(&ProtocolError::invalid(envelope.id(), NEW_SESSION_REQUIRED));
    };

    match session.transport().handle(envelope, &auth).await {
        Ok(Some(rpc_reply)) => reply(rpc_reply),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(err) => protocol_error(&err),
    }
}

fn initialize(state: &AppState, auth: &AuthContext, envelope: Envelope) -> Response {
    let Envelope::Request { id, params, .. } = envelope else {
        return protocol_error(&ProtocolError::invalid(Value::Null, NEW_SESSION_REQUIRED));
    };

    // Params are validated before any registry mutation
    let protocol_version = match negotiate_initialize(params) {
        Ok(version) => version,
        Err(error) => return reply(RpcReply::failure(id, error)),
    };

    let session = state.sessions.create_session(auth.client_id());
    let result = match session.transport().activate(protocol_version) {
        Ok(result) => result,
        Err(err) => {
            session.transport().close();
            return protocol_error(&err);
        }
    };
    let result = match serde_json::to_value(result) {
        Ok(value) => value,
        Err(e) => {
            session.transport().close();
            return reply(RpcReply::failure(
                id,
                rmcp::ErrorData::internal_error(format!("Failed to serialize initialize result: {}", e), None),
            ));
        }
    };

    info!(
        session_id = %session.id(),
        client = %auth.short_client(),
        "[Gateway] Client initialized"
    );

    let mut response = reply(RpcReply::success(id, result));
    if let Some((name, value)) = session_header_value(session.id().as_str()) {
        response.headers_mut().insert(name, value);
    }
    response
}

/// `GET {mcp_path}`: server push stream for an established session
pub async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = session_header(&headers).and_then(|id| state.sessions.lookup(id)) else {
        return invalid_session();
    };

    let stream = match session.transport().open_stream() {
        Ok(stream) => stream,
        Err(StreamError::AlreadyOpen) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": StreamError::AlreadyOpen.to_string() })),
            )
                .into_response();
        }
        Err(StreamError::NotActive | StreamError::Closed) => return invalid_session(),
    };

    let events = stream.map(|notification| {
        let event = Event::default()
            .event("message")
            .json_data(&notification)
            .unwrap_or_else(|e| Event::default().comment(format!("dropped notification: {}", e)));
        Ok::<_, Infallible>(event)
    });

    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));
    let mut response = sse.into_response();
    if let Some((name, value)) = session_header_value(session.id().as_str()) {
        response.headers_mut().insert(name, value);
    }
    response
}

/// `DELETE {mcp_path}`: terminate a session
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(id) = session_header(&headers) else {
        return invalid_session();
    };
    if !state.sessions.close(id) {
        return invalid_session();
    }
    info!(session_id = %id, "[Gateway] Session terminated by client");
    StatusCode::OK.into_response()
}
