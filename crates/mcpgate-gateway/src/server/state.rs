//! Shared router state

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthProvider;
use crate::session::SessionRegistry;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Identity provider selected at startup, never swapped
    pub provider: Arc<dyn AuthProvider>,
    pub sessions: SessionRegistry,
    /// Streamable HTTP endpoint path (e.g. `/mcp`)
    pub mcp_path: Arc<str>,
}

impl AppState {
    pub fn new(provider: Arc<dyn AuthProvider>, sessions: SessionRegistry, mcp_path: &str) -> Self {
        Self {
            provider,
            sessions,
            mcp_path: Arc::from(mcp_path),
        }
    }
}

impl FromRef<AppState> for Arc<dyn AuthProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.provider.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
