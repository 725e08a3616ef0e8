use crate::config::Config;
use crate::extensions::ExtensionRegistry;
use crate::session::handler::{ws_upgrade, AppState};
use crate::utils::banner::{log_banner, machine_ipv4};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const WS_PATH: &str = "/ws";

/// `/ws` for the launch protocol, extension mounts, then the public assets
/// for everything else.
pub fn build_router(state: AppState, public_dir: &Path, registry: &ExtensionRegistry) -> Router {
    let router = Router::new().route(WS_PATH, get(ws_upgrade));
    let router = registry.apply(router);

    router
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, registry: ExtensionRegistry) -> Result<()> {
    if which::which(&config.allowed_tool).is_err() {
        warn!(tool = %config.allowed_tool, "Allowed tool is not installed or not in PATH. Launch requests will fail to spawn.");
    }
    info!(
        tool = %config.allowed_tool,
        "Launched commands run with the server's environment in the directory the browser sends; serve on trusted networks only"
    );

    if !config.public_dir.is_dir() {
        warn!(path = %config.public_dir.display(), "Public directory does not exist; only extension assets and /ws will be served");
    }

    let events = registry.event_handlers();
    if !events.is_empty() {
        info!(events = ?events, "Extension events registered");
    }
    let state = AppState::new(&config, events);
    let app = build_router(state, &config.public_dir, &registry);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    let ip = machine_ipv4();
    log_banner(config.port, ip);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
