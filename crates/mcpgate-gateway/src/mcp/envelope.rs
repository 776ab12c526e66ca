//! JSON-RPC 2.0 envelopes as they travel over Streamable HTTP

use rmcp::model::ErrorCode;
use rmcp::ErrorData as McpError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// One inbound message, classified
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Expects a reply. `id` is `Null` when the caller sent none.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Result or error sent back by the client
    ClientResponse { id: Value },
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ProtocolError::parse(format!("Parse error: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err(ProtocolError::invalid(
                    Value::Null,
                    "Invalid Request: batch requests are not supported",
                ))
            }
            _ => {
                return Err(ProtocolError::invalid(
                    Value::Null,
                    "Invalid Request: expected a JSON object",
                ))
            }
        };

        let id = object.remove("id");
        let reply_id = id.clone().unwrap_or(Value::Null);

        if let Some(version) = object.get("jsonrpc") {
            if version.as_str() != Some(JSONRPC_VERSION) {
                return Err(ProtocolError::invalid(
                    reply_id,
                    "Invalid Request: jsonrpc must be \"2.0\"",
                ));
            }
        }

        match object.remove("method") {
            Some(Value::String(method)) => {
                let params = object.remove("params");
                if id.is_none() && is_notification(&method) {
                    Ok(Self::Notification { method, params })
                } else {
                    Ok(Self::Request {
                        id: reply_id,
                        method,
                        params,
                    })
                }
            }
            Some(_) => Err(ProtocolError::invalid(
                reply_id,
                "Invalid Request: method must be a string",
            )),
            None if object.contains_key("result") || object.contains_key("error") => {
                Ok(Self::ClientResponse { id: reply_id })
            }
            None => Err(ProtocolError::invalid(
                reply_id,
                "Invalid Request: missing method",
            )),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::ClientResponse { .. } => None,
        }
    }

    pub fn id(&self) -> Value {
        match self {
            Self::Request { id, .. } | Self::ClientResponse { id } => id.clone(),
            Self::Notification { .. } => Value::Null,
        }
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self, Self::Request { method, .. } if method == "initialize")
    }
}

fn is_notification(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Outbound reply to one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcReply {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl RpcReply {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Server-originated notification pushed on the session stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// Malformed or out-of-place envelope, rejected with HTTP 400
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub id: Value,
    pub message: String,
}

impl ProtocolError {
    pub fn invalid(id: Value, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::INVALID_REQUEST,
            id,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::PARSE_ERROR,
            id: Value::Null,
            message: message.into(),
        }
    }

    pub fn reply(&self) -> RpcReply {
        RpcReply::failure(
            self.id.clone(),
            McpError::new(self.code, self.message.clone(), None),
        )
    }
}

/// Params as an object map; absent params count as `{}`
pub fn params_object(params: Option<Value>) -> Result<Map<String, Value>, McpError> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(McpError::invalid_params("params must be an object", None)),
    }
}
