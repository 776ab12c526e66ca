//! Trace Context - Request correlation and structured logging

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::http::Request;
use tracing::{info, info_span, Span};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Placeholder when a request never passed through the logging middleware
const UNKNOWN_TRACE_ID: &str = "??????";

/// Generate a short trace ID: 6 hex characters (e.g. "a1b2c3")
pub fn generate_trace_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    // Spread consecutive counters across the id space
    let mixed = timestamp.wrapping_add(counter.wrapping_mul(0x9E37_79B9));
    format!("{:06x}", mixed & 0xFF_FFFF)
}

/// Correlation data for one HTTP request
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    /// JSON-RPC method, when the body carried one
    pub mcp_method: Option<String>,
    /// `Mcp-Session-Id` presented by the caller
    pub session_id: Option<String>,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            mcp_method: None,
            session_id: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_mcp_method(mut self, method: Option<String>) -> Self {
        self.mcp_method = method;
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Trace id recorded on a request, or a placeholder
    pub fn id_of<B>(request: &Request<B>) -> String {
        request
            .extensions()
            .get::<TraceContext>()
            .map(|ctx| ctx.trace_id.clone())
            .unwrap_or_else(|| UNKNOWN_TRACE_ID.to_string())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// First 8 chars of the session id, or "-"
    pub fn short_session(&self) -> &str {
        self.session_id
            .as_deref()
            .map(|s| s.get(..8).unwrap_or(s))
            .unwrap_or("-")
    }
}

/// Request span builder for structured logging
pub struct RequestSpan;

impl RequestSpan {
    /// Span carrying trace_id for every child log of the request
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "request",
            trace_id = %ctx.trace_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    /// Log request entry (single consolidated line)
    pub fn log_entry(ctx: &TraceContext) {
        match ctx.mcp_method.as_deref() {
            Some(mcp_method) => info!(
                trace_id = %ctx.trace_id,
                "→ {} {} {} session={}",
                ctx.method,
                ctx.path,
                mcp_method,
                ctx.short_session()
            ),
            None => info!(trace_id = %ctx.trace_id, "→ {} {}", ctx.method, ctx.path),
        }
    }

    /// Log request completion (single consolidated line)
    pub fn log_exit(ctx: &TraceContext, status: u16, detail: Option<&str>) {
        let elapsed = ctx.elapsed_ms();

        match detail {
            Some(d) => info!(trace_id = %ctx.trace_id, "← {} {} ({}ms)", status, d, elapsed),
            None => info!(trace_id = %ctx.trace_id, "← {} ({}ms)", status, elapsed),
        }
    }
}
