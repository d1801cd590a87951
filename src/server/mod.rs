//! HTTP endpoint serving generated tiles
//!
//! A single `GET /` route; every request draws a new tile from the
//! configured model file, or from a random model in the configured
//! directory.

mod handlers;

pub use handlers::{
    generate_tile, render_tile, AppState, RenderedTile, SharedState, MODEL_LABEL_HEADER,
};

use std::sync::Arc;

use axum::{routing::get, Router};
use tch::Device;
use tracing::info;

use crate::utils::ServerConfig;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new().route("/", get(generate_tile)).with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: ServerConfig, device: Device) -> anyhow::Result<()> {
    let addr = config.addr()?;
    info!(
        "Serving tiles from {} on http://{}",
        config.model_path.display(),
        addr
    );

    let state = Arc::new(AppState { config, device });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
