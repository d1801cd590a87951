//! HTTP request handlers
//!
//! Axum handlers for the tile sampling endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tch::Device;
use tracing::{error, info, warn};

use crate::error::AzulejoError;
use crate::utils::{encode_png, upscale_for_serving, ServerConfig, TrainedGenerator};

/// Response header carrying the provenance label of the model used
pub const MODEL_LABEL_HEADER: &str = "x-model-label";

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub device: Device,
}

pub type SharedState = Arc<AppState>;

/// One encoded tile and the label of the model that drew it
#[derive(Debug)]
pub struct RenderedTile {
    pub png: Vec<u8>,
    pub label: String,
}

/// Load the configured model, draw one tile and encode it at serving size
///
/// Models are loaded per request so a model directory can be refreshed
/// while the server runs.
pub fn render_tile(state: &AppState) -> anyhow::Result<RenderedTile> {
    let model = TrainedGenerator::load(&state.config.model_path, state.device)?;
    let image = model
        .render(1, model.meta().output_rescale)?
        .into_iter()
        .next()
        .ok_or_else(|| AzulejoError::NoModelFound(model.path().to_path_buf()))?;

    let png = encode_png(&upscale_for_serving(&image))?;
    Ok(RenderedTile {
        png,
        label: model.label(),
    })
}

/// Header value for a model label, if the label is plain visible ASCII
fn label_header(label: &str) -> Option<HeaderValue> {
    let printable = label.bytes().all(|b| b == b' ' || b.is_ascii_graphic());
    match HeaderValue::from_str(label) {
        Ok(value) if printable => Some(value),
        _ => {
            warn!("Model label '{}' is not valid in a header, omitting it", label.escape_debug());
            None
        }
    }
}

/// `GET /`: a freshly generated tile as PNG
pub async fn generate_tile(State(state): State<SharedState>) -> Response {
    let worker_state = Arc::clone(&state);
    let rendered = tokio::task::spawn_blocking(move || render_tile(&worker_state)).await;

    match rendered {
        Ok(Ok(tile)) => {
            info!("Served tile from model '{}'", tile.label);
            let mut response =
                (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], tile.png).into_response();
            if let Some(value) = label_header(&tile.label) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(MODEL_LABEL_HEADER), value);
            }
            response
        }
        Ok(Err(e)) => {
            error!("Failed to generate tile: {:#}", e);
            let body = format!("failed to generate tile: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
        Err(e) => {
            error!("Generation worker failed: {}", e);
            let body = "generation worker failed".to_string();
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}
