//! Road Patrol - multi-tenant road inspection backend
//! Mission: Serve tenant-scoped inspection records behind role-gated JWT auth

use anyhow::{Context, Result};
use clap::Parser;
use road_patrol_backend::{
    api::{self, AppState},
    config::{load_env, Config},
    telemetry::init_tracing,
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();
    info!("🚀 Road Patrol backend starting");

    let state = AppState::from_config(&config).await?;
    info!(
        path = %config.database_path,
        queue_capacity = config.store_queue_capacity,
        backpressure = ?config.store_backpressure,
        "📊 Store ready"
    );

    let app = api::router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
