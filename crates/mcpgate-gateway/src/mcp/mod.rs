//! MCP protocol layer
//!
//! JSON-RPC envelopes, the procedure registry exposed as tools, and the
//! per-session transport state machine.

mod envelope;
mod hello;
mod procedures;
mod transport;

pub use envelope::{params_object, Envelope, ProtocolError, RpcNotification, RpcReply, JSONRPC_VERSION};
pub use hello::{greeting, HelloParams, HelloProcedure};
pub use procedures::{parse_params, CallContext, Procedure, ProcedureError, ProcedureRegistry};
pub use transport::{
    negotiate_initialize, negotiate_protocol_version, Notifier, StreamError, Transport,
    TransportState,
};

use mcpgate_core::branding;
use rmcp::model::{Implementation, InitializeResult, ProtocolVersion, ServerCapabilities, ToolsCapability};

/// Initialize result advertised to every client
pub fn initialize_result(protocol_version: ProtocolVersion) -> InitializeResult {
    InitializeResult {
        protocol_version,
        capabilities: ServerCapabilities::builder()
            .enable_logging()
            .enable_tools_with(ToolsCapability {
                list_changed: Some(false),
            })
            .build(),
        server_info: Implementation {
            name: branding::SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
        instructions: Some(format!(
            "{} exposes a hello tool. Open a GET stream on the MCP endpoint to receive log notifications.",
            branding::DISPLAY_NAME
        )),
    }
}
