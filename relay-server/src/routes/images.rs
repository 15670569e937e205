//! Image generation route.
//!
//! Forwards the prompt to the configured image provider and returns the
//! result as a base64 data URI.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::images::{GenerateImageRequest, GenerateImageResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(generate_image))]
pub struct ImagesApi;

/// Register image generation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/generate-image", post(generate_image))
}

/// Image generation (`POST /generate-image`).
///
/// An absent or unreadable JSON body is treated like an empty prompt.
#[utoipa::path(
    post,
    path = "/generate-image",
    tag = "images",
    request_body = GenerateImageRequest,
    responses(
        (status = 200, description = "Generated image", body = GenerateImageResponse),
        (status = 400, description = "Missing prompt"),
        (status = 500, description = "Provider unreachable"),
    )
)]
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, ServerError> {
    let req = payload
        .map(|Json(req)| req)
        .unwrap_or_else(|rejection| {
            debug!(error = %rejection, "unreadable image request body");
            GenerateImageRequest::default()
        });

    let image = state.images.generate(&req.prompt).await?;
    Ok(Json(GenerateImageResponse { image }))
}
