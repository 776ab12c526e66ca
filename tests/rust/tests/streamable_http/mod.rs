//! Streamable HTTP Transport Integration Tests
//!
//! Tests the stateful Streamable HTTP transport with:
//! - Session management (Mcp-Session-Id)
//! - Server-initiated notifications over the GET push stream
//! - Procedure dispatch and argument validation

mod notifications;
mod procedures;
