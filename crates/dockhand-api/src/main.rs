//! Dockhand HTTP server.

use anyhow::Context;
use dockhand_api::{AppState, routes};
use dockhand_config::SystemConfig;
use dockhand_scheduler::PgJobQueue;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("DOCKHAND_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_path = std::env::var_os("DOCKHAND_CONFIG").map(PathBuf::from);
    let config = SystemConfig::load(config_path.as_deref()).context("loading configuration")?;

    info!(queue = %config.queue, "Connecting to queue database...");
    let queue = PgJobQueue::connect(&config.database_url, config.queue.clone())
        .await
        .context("connecting to queue database")?;
    info!("Queue connected");

    let state = AppState::new(Arc::new(queue), &config);
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    info!("Starting server on {}", config.listen);
    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}
