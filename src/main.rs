mod config;
mod error;
mod extensions;
mod server;
mod session;
mod tools;
mod utils;

use crate::config::Config;
use crate::extensions::ExtensionRegistry;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt::format::FmtSpan, FmtSubscriber};

fn setup_logging(log_level_str: &str, json: bool) {
    let level = match log_level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("edp_web={},tower_http=warn", level)));

    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_level(true);

    let result = if json {
        let subscriber = builder
            .with_target(true)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        tracing::subscriber::set_global_default(builder.with_target(false).finish())
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    setup_logging(&config.log_level, config.log_json);

    tracing::info!(version = %env!("CARGO_PKG_VERSION"), "Starting edp-web");
    tracing::debug!("Loaded configuration: {:?}", config);

    let registry = ExtensionRegistry::from_dirs(&config.extension_dirs);
    if !registry.is_empty() {
        tracing::info!(count = registry.len(), extensions = ?registry.names().collect::<Vec<_>>(), "Extensions registered");
    }

    server::serve(config, registry).await?;

    tracing::info!("Server shutdown.");
    Ok(())
}
