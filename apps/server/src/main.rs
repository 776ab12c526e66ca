//! McpGate server binary
//!
//! Loads configuration from the environment (and `.env`), selects the identity
//! provider and serves the gateway until SIGINT/SIGTERM.

use std::path::Path;

use anyhow::Context;
use mcpgate_core::{branding, GatewaySettings};
use mcpgate_gateway::{build_provider, GatewayConfig, GatewayServer};
use tracing::{error, info};

/// Initialize tracing with console and file logging
///
/// - Console: colored, compact
/// - File: daily rotation under `log_dir`, e.g. `mcpgate.2026-01-22.log`
fn init_tracing(log_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(branding::LOG_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG takes precedence
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("info,mcpgate=debug,mcpgate_core=debug,mcpgate_gateway=debug")?,
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let settings = GatewaySettings::from_env();
    let log_dir = settings
        .as_ref()
        .map(|s| s.log_dir.clone())
        .unwrap_or_else(|_| branding::DEFAULT_LOG_DIR.to_string());
    let _guard = init_tracing(Path::new(&log_dir))?;

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("[Config] {}", e);
            return Err(e).context("Invalid configuration");
        }
    };

    info!(
        "[Gateway] {} v{} (provider: {})",
        branding::DISPLAY_NAME,
        env!("CARGO_PKG_VERSION"),
        settings.provider.kind()
    );

    let provider = build_provider(&settings.provider);
    let server = GatewayServer::new(GatewayConfig::from(&settings), provider);
    server.run().await
}
