//! McpGate Gateway
//!
//! MCP server over Streamable HTTP that provides:
//! - Bearer authentication against a pluggable identity provider (Auth0,
//!   Entra External ID, or an authority fronted through an internal URL)
//! - RFC 9728 / RFC 8414 discovery documents
//! - Server-assigned sessions with a per-session transport state machine
//! - A procedure registry exposed as MCP tools

pub mod auth;
pub mod logging;
pub mod mcp;
pub mod oauth;
pub mod server;
pub mod session;

pub use auth::{
    build_provider, Auth0Provider, AuthContext, AuthError, AuthProvider, EntraProvider,
    ProxiedProvider, StaticKeyVerifier, TokenVerifier,
};
pub use mcp::{Procedure, ProcedureError, ProcedureRegistry, Transport, TransportState};
pub use oauth::{AuthorizationServerMetadata, ProtectedResourceMetadata};
pub use server::{GatewayConfig, GatewayServer};
pub use session::{Session, SessionId, SessionRegistry};
