use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod config;
mod error;
mod pipeline;
mod service;
mod telemetry;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting pdflight service v{}", env!("CARGO_PKG_VERSION"));

    // Configuration is read once here and handed down; nothing reads env later
    let config = Arc::new(crate::config::load_config()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        max_mb = config.max_mb,
        default_preset = %config.default_preset,
        ocr_default = config.ocr_default,
        timeout_secs = config.tools.timeout_secs,
        "Configuration loaded"
    );

    if let Some(work_dir) = &config.tools.work_dir {
        std::fs::create_dir_all(work_dir)?;
    }

    let metrics = telemetry::install_recorder()?;

    let app = api::router(config.clone(), Some(metrics));

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdflight_service=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
