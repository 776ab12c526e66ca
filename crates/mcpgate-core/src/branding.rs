//! Centralized branding constants
//!
//! All product naming and well-known protocol strings come from this module.

/// User-facing display name
pub const DISPLAY_NAME: &str = "McpGate";

/// Name reported in the MCP `serverInfo` block
pub const SERVER_NAME: &str = "mcp-hello-world";

/// Log file prefix
pub const LOG_PREFIX: &str = "mcpgate";

/// Default port the gateway listens on
pub const DEFAULT_GATEWAY_PORT: u16 = 3000;

/// Default path of the Streamable HTTP endpoint
pub const DEFAULT_MCP_PATH: &str = "/mcp";

/// Default directory for rotated log files
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Header carrying the server-assigned session id
pub const SESSION_HEADER: &str = "mcp-session-id";

/// RFC 9728 protected resource metadata path
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// RFC 8414 authorization server metadata path
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

/// Scopes advertised in discovery documents
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Realm used in `WWW-Authenticate` challenges
pub fn auth_realm() -> String {
    format!("{} Gateway", DISPLAY_NAME)
}

/// Build the protected resource metadata URL for an origin
///
/// # Example
/// ```
/// use mcpgate_core::branding;
///
/// let url = branding::resource_metadata_url("https://mcp.example.com/");
/// assert_eq!(url, "https://mcp.example.com/.well-known/oauth-protected-resource");
/// ```
pub fn resource_metadata_url(origin: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), PROTECTED_RESOURCE_PATH)
}
