//! Procedure registry
//!
//! Procedures are exposed as MCP tools. Each declares a JSON input schema and
//! receives its arguments deserialized into a typed parameter struct.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use rmcp::ErrorData as McpError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::transport::Notifier;
use crate::session::SessionId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcedureError {
    /// Arguments did not match the declared input schema
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Procedure failed: {0}")]
    Failed(String),
}

impl From<ProcedureError> for McpError {
    fn from(err: ProcedureError) -> Self {
        match err {
            ProcedureError::InvalidParams(_) => McpError::invalid_params(err.to_string(), None),
            ProcedureError::Failed(_) => McpError::internal_error(err.to_string(), None),
        }
    }
}

/// Deserialize procedure arguments into their typed form
pub fn parse_params<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, ProcedureError> {
    let arguments = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value) => value,
    };
    serde_json::from_value(arguments).map_err(|e| ProcedureError::InvalidParams(e.to_string()))
}

/// What a procedure knows about the turn invoking it
#[derive(Clone)]
pub struct CallContext {
    pub session_id: SessionId,
    pub client_id: String,
    pub notifier: Notifier,
}

#[async_trait]
pub trait Procedure: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object
    fn input_schema(&self) -> JsonObject;

    async fn call(
        &self,
        ctx: CallContext,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, ProcedureError>;

    fn tool(&self) -> Tool {
        Tool::new(self.name(), self.description(), Arc::new(self.input_schema()))
    }
}

/// Name → procedure, listed in name order
#[derive(Clone, Default)]
pub struct ProcedureRegistry {
    procedures: BTreeMap<&'static str, Arc<dyn Procedure>>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the procedures this gateway ships
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::hello::HelloProcedure));
        registry
    }

    /// Register a procedure, replacing any with the same name
    pub fn register(&mut self, procedure: Arc<dyn Procedure>) {
        self.procedures.insert(procedure.name(), procedure);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        self.procedures.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.procedures.values().map(|p| p.tool()).collect()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
