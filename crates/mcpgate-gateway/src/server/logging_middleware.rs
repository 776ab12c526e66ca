//! HTTP Request/Response Logging Middleware
//!
//! One entry and one exit line per request, correlated by trace id. JSON-RPC
//! responses on the MCP endpoint are summarized; push streams are passed
//! through untouched.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use mcpgate_core::branding;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, TraceContext};

/// Largest request body buffered for method extraction (4MB)
const MAX_REQUEST_BODY: usize = 4 * 1024 * 1024;

/// Headers that should be redacted
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Headers worth printing at DEBUG
const LOGGED_HEADERS: &[&str] = &[
    "content-type",
    "accept",
    "authorization",
    "user-agent",
    "mcp-session-id",
    "mcp-protocol-version",
    "x-forwarded-proto",
    "x-forwarded-host",
];

/// Redact sensitive headers (compact format for DEBUG)
pub fn redact_headers_compact(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| LOGGED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summarize a JSON-RPC response body
pub fn format_mcp_response(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;

    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        return Some(format!("error: {} ({})", message, code));
    }

    let result = json.get("result")?;
    if let Some(tools) = result.get("tools").and_then(|t| t.as_array()) {
        return Some(format!("tools: {}", tools.len()));
    }
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        let types: Vec<&str> = content
            .iter()
            .filter_map(|c| c.get("type").and_then(|t| t.as_str()))
            .collect();
        return Some(format!(
            "content: {} items [{}]",
            content.len(),
            types.join(", ")
        ));
    }
    if let Some(version) = result.get("protocolVersion").and_then(|v| v.as_str()) {
        let name = result
            .get("serverInfo")
            .and_then(|s| s.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("?");
        return Some(format!("initialized: {} ({})", name, version));
    }
    match result.as_object() {
        Some(object) if !object.is_empty() => {
            let keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
            Some(format!("result: {{{}}}", keys.join(", ")))
        }
        _ => Some("ok".to_string()),
    }
}

/// Extract MCP method from JSON-RPC body
pub fn extract_mcp_method(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    json.get("method")
        .and_then(|m| m.as_str())
        .map(String::from)
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

/// Logging middleware for requests and responses
///
/// Generates a trace_id, stores the [`TraceContext`] in request extensions and
/// logs a single entry/exit line per request.
pub async fn http_logging_middleware(
    State(mcp_path): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let is_mcp = path == *mcp_path;

    let session_id = request
        .headers()
        .get(branding::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let ctx = TraceContext::new(method.as_str(), &path).with_session(session_id);
    let span = RequestSpan::enter(&ctx);

    async move {
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(request.headers()),
            "Request headers"
        );

        // Buffer JSON-RPC bodies to learn the method; everything else streams
        let (ctx, mut request) = if is_mcp && method == Method::POST {
            let (parts, body) = request.into_parts();
            let bytes = match to_bytes(body, MAX_REQUEST_BODY).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                    return Err(StatusCode::PAYLOAD_TOO_LARGE);
                }
            };
            let ctx = ctx.with_mcp_method(extract_mcp_method(&bytes));
            (ctx, Request::from_parts(parts, Body::from(bytes)))
        } else {
            (ctx, request)
        };

        RequestSpan::log_entry(&ctx);
        request.extensions_mut().insert(ctx.clone());

        let response = next.run(request).await;
        let status = response.status().as_u16();

        if !is_mcp || is_event_stream(&response) {
            let detail = is_event_stream(&response).then_some("stream");
            RequestSpan::log_exit(&ctx, status, detail);
            return Ok(response);
        }

        let (parts, body) = response.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let summary = format_mcp_response(&body_bytes);
        RequestSpan::log_exit(&ctx, status, summary.as_deref());

        Ok(Response::from_parts(parts, Body::from(body_bytes)))
    }
    .instrument(span)
    .await
}
