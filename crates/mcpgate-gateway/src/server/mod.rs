//! Gateway Server
//!
//! HTTP server exposing the MCP endpoint over Streamable HTTP, guarded by
//! bearer authentication, plus the public OAuth discovery documents.

mod handlers;
pub mod logging_middleware;
mod state;

pub use handlers::HealthResponse;
pub use state::AppState;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use mcpgate_core::{branding, GatewaySettings};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{mcp_auth_middleware, AuthProvider};
use crate::mcp::ProcedureRegistry;
use crate::session::SessionRegistry;

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path of the Streamable HTTP endpoint
    pub mcp_path: String,
    /// Enable CORS for browser access
    pub enable_cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: branding::DEFAULT_GATEWAY_PORT,
            mcp_path: branding::DEFAULT_MCP_PATH.to_string(),
            enable_cors: true,
        }
    }
}

impl From<&GatewaySettings> for GatewayConfig {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            mcp_path: settings.mcp_path.clone(),
            enable_cors: settings.enable_cors,
        }
    }
}

impl GatewayConfig {
    /// Address to bind, `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// RFC 9728 path-suffixed metadata route for the MCP endpoint
    fn resource_metadata_path(&self) -> Option<String> {
        (self.mcp_path != "/")
            .then(|| format!("{}{}", branding::PROTECTED_RESOURCE_PATH, self.mcp_path))
    }
}

/// MCP Gateway Server
pub struct GatewayServer {
    config: GatewayConfig,
    provider: Arc<dyn AuthProvider>,
    sessions: SessionRegistry,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_procedures(config, provider, ProcedureRegistry::with_defaults())
    }

    pub fn with_procedures(
        config: GatewayConfig,
        provider: Arc<dyn AuthProvider>,
        procedures: ProcedureRegistry,
    ) -> Self {
        info!(
            "[Gateway] Initializing (provider: {}, {} procedure(s))",
            provider.kind(),
            procedures.len()
        );
        Self {
            config,
            provider,
            sessions: SessionRegistry::new(procedures),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Live sessions (shared with the router)
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let mcp_path = self.config.mcp_path.as_str();
        let app_state = AppState::new(self.provider.clone(), self.sessions.clone(), mcp_path);

        // Bearer auth applies to the MCP endpoint only
        let mcp_routes = Router::new()
            .route(
                mcp_path,
                post(handlers::mcp_post)
                    .get(handlers::mcp_get)
                    .delete(handlers::mcp_delete),
            )
            .route_layer(middleware::from_fn_with_state(
                self.provider.clone(),
                mcp_auth_middleware,
            ));

        let mut public_routes = Router::new()
            .route("/health", get(handlers::health))
            .route(
                branding::AUTHORIZATION_SERVER_PATH,
                get(handlers::authorization_server_metadata),
            )
            .route(
                branding::PROTECTED_RESOURCE_PATH,
                get(handlers::resource_metadata),
            );
        if let Some(path) = self.config.resource_metadata_path() {
            public_routes = public_routes.route(&path, get(handlers::resource_metadata));
        }

        let mut router = public_routes
            .merge(mcp_routes)
            .with_state(app_state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(
                app_state.mcp_path.clone(),
                logging_middleware::http_logging_middleware,
            ));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Run until Ctrl-C / SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            trigger.cancel();
        });
        self.run_until(shutdown).await
    }

    /// Bind the configured address and serve until `shutdown` fires
    pub async fn run_until(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// On shutdown every session is closed first so open push streams end and
    /// the graceful drain can complete.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("[Gateway] Starting on {}", listener.local_addr()?);
        info!("[Gateway] MCP endpoint: {}", self.config.mcp_path);
        info!(
            "[Gateway] CORS: {}",
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );

        let router = self.router();
        let sessions = self.sessions.clone();

        info!("[Gateway] Ready to accept connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("[Gateway] Shutdown requested");
                sessions.close_all();
            })
            .await?;

        info!("[Gateway] Stopped");
        Ok(())
    }

    /// Start the server in the background
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run_until(shutdown).await })
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere)
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        async fn wait(kind: SignalKind, name: &str) {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("[Gateway] Received {}, starting shutdown", name);
                }
                Err(e) => {
                    warn!("[Gateway] Cannot listen for {}: {}", name, e);
                    std::future::pending::<()>().await;
                }
            }
        }

        tokio::select! {
            _ = wait(SignalKind::interrupt(), "SIGINT") => {}
            _ = wait(SignalKind::terminate(), "SIGTERM") => {}
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("[Gateway] Received Ctrl-C, starting shutdown"),
            Err(e) => {
                warn!("[Gateway] Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
