//! Per-session transport state machine
//!
//! `Uninitialized → Active → Closed`. Request/response turns are answered on
//! their own HTTP response; server-initiated notifications go out on the
//! session's single push stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use rmcp::model::{
    CallToolResult, ErrorCode, InitializeResult, ListToolsResult, LoggingMessageNotificationParam,
    ProtocolVersion,
};
use rmcp::ErrorData as McpError;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::envelope::{params_object, Envelope, ProtocolError, RpcNotification, RpcReply};
use super::procedures::{CallContext, ProcedureRegistry};
use crate::auth::AuthContext;
use crate::session::{SessionId, SessionMap};

/// Notifications buffered per session before a slow push stream lags
const PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    Active,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("A push stream is already open for this session")]
    AlreadyOpen,
    #[error("Session is not initialized")]
    NotActive,
    #[error("Session is closed")]
    Closed,
}

/// Sender side of a session's push channel
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<RpcNotification>,
}

impl Notifier {
    /// Queue a notification; returns how many streams will receive it
    pub fn notify(&self, notification: RpcNotification) -> usize {
        self.tx.send(notification).unwrap_or(0)
    }

    /// `notifications/message`; true when a push stream was listening
    pub fn log_message(&self, param: LoggingMessageNotificationParam) -> bool {
        let params = serde_json::to_value(param).ok();
        self.notify(RpcNotification::new("notifications/message", params)) > 0
    }
}

#[derive(Debug, Deserialize)]
struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    client_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Validate initialize params and pick the protocol version for the session.
///
/// Absent params are accepted; the server's latest version is used.
pub fn negotiate_initialize(params: Option<Value>) -> Result<ProtocolVersion, McpError> {
    let params = params_object(params)?;
    let params: InitializeParams = serde_json::from_value(Value::Object(params))
        .map_err(|e| McpError::invalid_params(format!("Invalid initialize params: {}", e), None))?;

    let client_name = params
        .client_info
        .as_ref()
        .and_then(|info| info.get("name"))
        .and_then(|name| name.as_str())
        .unwrap_or("unknown");
    let version = negotiate_protocol_version(params.protocol_version.as_deref());
    debug!(client = %client_name, protocol_version = %version, "[Transport] Initialize negotiated");
    Ok(version)
}

/// Highest version both parties support
pub fn negotiate_protocol_version(client_version: Option<&str>) -> ProtocolVersion {
    let ours = ProtocolVersion::LATEST;
    let Some(client_version) = client_version else {
        return ours;
    };

    // Versions are ISO dates, so string order is release order
    if client_version > ours.to_string().as_str() {
        ours
    } else {
        serde_json::from_value(Value::String(client_version.to_string())).unwrap_or(ours)
    }
}

struct Inner {
    state: TransportState,
    protocol_version: Option<ProtocolVersion>,
}

pub struct Transport {
    session_id: SessionId,
    inner: Mutex<Inner>,
    push: broadcast::Sender<RpcNotification>,
    stream_open: AtomicBool,
    cancel: CancellationToken,
    procedures: Arc<ProcedureRegistry>,
    directory: Weak<SessionMap>,
}

impl Transport {
    pub(crate) fn new(
        session_id: SessionId,
        procedures: Arc<ProcedureRegistry>,
        directory: Weak<SessionMap>,
    ) -> Self {
        let (push, _) = broadcast::channel(PUSH_BUFFER);
        Self {
            session_id,
            inner: Mutex::new(Inner {
                state: TransportState::Uninitialized,
                protocol_version: None,
            }),
            push,
            stream_open: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            procedures,
            directory,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.inner.lock().protocol_version.clone()
    }

    pub fn notifier(&self) -> Notifier {
        Notifier {
            tx: self.push.clone(),
        }
    }

    /// `Uninitialized → Active`; returns the initialize result
    pub fn activate(&self, protocol_version: ProtocolVersion) -> Result<InitializeResult, ProtocolError> {
        let mut inner = self.inner.lock();
        if inner.state != TransportState::Uninitialized {
            return Err(ProtocolError::invalid(
                Value::Null,
                "Bad Request: Server already initialized",
            ));
        }
        inner.state = TransportState::Active;
        inner.protocol_version = Some(protocol_version.clone());
        drop(inner);

        info!(
            session_id = %self.session_id,
            protocol_version = %protocol_version,
            "[Transport] Session active"
        );
        Ok(super::initialize_result(protocol_version))
    }

    /// Run one protocol turn. `None` means the envelope needs no reply (202).
    pub async fn handle(
        &self,
        envelope: Envelope,
        auth: &AuthContext,
    ) -> Result<Option<RpcReply>, ProtocolError> {
        if self.state() != TransportState::Active {
            return Err(ProtocolError::invalid(
                envelope.id(),
                "Bad Request: Session is not active",
            ));
        }

        match envelope {
            Envelope::Notification { method, .. } => {
                debug!(session_id = %self.session_id, method = %method, "[Transport] Notification");
                Ok(None)
            }
            Envelope::ClientResponse { id } => {
                debug!(session_id = %self.session_id, id = %id, "[Transport] Client response accepted");
                Ok(None)
            }
            Envelope::Request { id, method, .. } if method == "initialize" => Err(
                ProtocolError::invalid(id, "Bad Request: Server already initialized"),
            ),
            Envelope::Request { id, method, params } => {
                let reply = match self.dispatch(&method, params, auth).await {
                    Ok(result) => RpcReply::success(id, result),
                    Err(error) => {
                        debug!(
                            session_id = %self.session_id,
                            method = %method,
                            code = error.code.0,
                            "[Transport] Request failed: {}", error.message
                        );
                        RpcReply::failure(id, error)
                    }
                };
                Ok(Some(reply))
            }
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        auth: &AuthContext,
    ) -> Result<Value, McpError> {
        match method {
            "ping" => Ok(json!({})),
            // Level filtering is not applied; accepted so clients can call it
            "logging/setLevel" => Ok(json!({})),
            "tools/list" => to_result(ListToolsResult::with_all_items(self.procedures.tools())),
            "tools/call" => {
                let params = Value::Object(params_object(params)?);
                let call: ToolCallParams = serde_json::from_value(params).map_err(|e| {
                    McpError::invalid_params(format!("Invalid tools/call params: {}", e), None)
                })?;
                self.invoke(&call.name, call.arguments, auth).await
            }
            name if self.procedures.contains(name) => self.invoke(name, params, auth).await,
            other => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
                None,
            )),
        }
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Option<Value>,
        auth: &AuthContext,
    ) -> Result<Value, McpError> {
        let procedure = self
            .procedures
            .get(name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", name), None))?;

        let ctx = CallContext {
            session_id: self.session_id.clone(),
            client_id: auth.client_id().to_string(),
            notifier: self.notifier(),
        };
        debug!(
            session_id = %self.session_id,
            client = %auth.short_client(),
            tool = %name,
            "[Transport] Invoking procedure"
        );

        let result: CallToolResult = procedure.call(ctx, arguments).await?;
        to_result(result)
    }

    /// Claim the session's push stream.
    ///
    /// The stream ends when the session closes. Dropping it (peer went away)
    /// closes the session.
    pub fn open_stream(self: &Arc<Self>) -> Result<BoxStream<'static, RpcNotification>, StreamError> {
        match self.state() {
            TransportState::Active => {}
            TransportState::Uninitialized => return Err(StreamError::NotActive),
            TransportState::Closed => return Err(StreamError::Closed),
        }
        if self
            .stream_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StreamError::AlreadyOpen);
        }

        let mut rx = self.push.subscribe();
        let cancel = self.cancel.clone();
        let guard = StreamGuard {
            transport: self.clone(),
        };
        info!(session_id = %self.session_id, "[Transport] Push stream opened");

        let stream = async_stream::stream! {
            let _guard = guard;
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => received,
                };
                match received {
                    Ok(notification) => yield notification,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("[Transport] Push stream lagged, {} notification(s) dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(stream.boxed())
    }

    pub fn has_stream(&self) -> bool {
        self.stream_open.load(Ordering::Acquire)
    }

    /// `→ Closed`. Removes the registry entry and ends the push stream.
    ///
    /// Returns false if already closed.
    pub fn close(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state == TransportState::Closed {
                return false;
            }
            inner.state = TransportState::Closed;
        }

        self.cancel.cancel();
        if let Some(directory) = self.directory.upgrade() {
            directory.remove(self.session_id.as_str());
        }
        info!(session_id = %self.session_id, "[Transport] Session closed");
        true
    }
}

/// Closes the session when the push stream is dropped
struct StreamGuard {
    transport: Arc<Transport>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.transport.stream_open.store(false, Ordering::Release);
        if self.transport.close() {
            debug!(
                session_id = %self.transport.session_id,
                "[Transport] Push stream dropped by peer"
            );
        }
    }
}

fn to_result<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {}", e), None))
}
