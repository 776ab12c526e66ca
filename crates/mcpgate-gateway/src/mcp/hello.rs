use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, JsonObject, LoggingLevel, LoggingMessageNotificationParam};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::procedures::{parse_params, CallContext, Procedure, ProcedureError};

#[derive(Debug, Deserialize)]
pub struct HelloParams {
    pub name: String,
}

/// Greets the caller and logs the greeting on the session push stream
pub struct HelloProcedure;

pub fn greeting(name: &str) -> String {
    format!(
        "Hello, {}! This is a response from the MCP Hello World server.",
        name
    )
}

#[async_trait]
impl Procedure for HelloProcedure {
    fn name(&self) -> &'static str {
        "hello"
    }

    fn description(&self) -> &'static str {
        "Say hello to someone"
    }

    fn input_schema(&self) -> JsonObject {
        match json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name to greet" }
            },
            "required": ["name"]
        }) {
            Value::Object(schema) => schema,
            _ => JsonObject::new(),
        }
    }

    async fn call(
        &self,
        ctx: CallContext,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, ProcedureError> {
        let params: HelloParams = parse_params(arguments)?;
        let text = greeting(&params.name);

        let delivered = ctx.notifier.log_message(LoggingMessageNotificationParam {
            level: LoggingLevel::Info,
            logger: Some(self.name().to_string()),
            data: json!(format!("Greeted {}", params.name)),
        });
        debug!(
            session_id = %ctx.session_id,
            delivered,
            "[Transport] hello notification queued"
        );

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
