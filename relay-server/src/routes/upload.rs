//! Image upload + analysis route.
//!
//! Accepts one JPEG/PNG file in the multipart field `image`. The declared
//! type is checked from the part headers before any byte is read, and the
//! size limit is enforced while streaming.

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bytes::BytesMut;
use tracing::debug;
use utoipa::OpenApi;

use crate::config::Config;
use crate::error::ServerError;
use crate::schemas::upload::{UploadImageForm, UploadImageResponse};
use crate::services::upload::{NO_IMAGE, UPLOAD_OK, validate_image};
use crate::services::IncomingImage;
use crate::state::AppState;

const IMAGE_FIELD: &str = "image";

#[derive(OpenApi)]
#[openapi(paths(upload_image))]
pub struct UploadApi;

/// Register upload routes.
pub fn router(config: &Config) -> Router<Arc<AppState>> {
    Router::new().route(
        "/upload-image",
        post(upload_image)
            .layer(DefaultBodyLimit::max(config.upload_body_limit())),
    )
}

/// Upload and analyse an image (`POST /upload-image`).
#[utoipa::path(
    post,
    path = "/upload-image",
    tag = "upload",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image analysed", body = UploadImageResponse),
        (status = 400, description = "No image or disallowed type"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Analysis failed"),
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadImageResponse>, ServerError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!(error = %rejection, "not a multipart request");
        ServerError::BadRequest(NO_IMAGE.into())
    })?;
    let max_bytes = state.config.max_upload_bytes;

    let mut image: Option<IncomingImage> = None;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if image.is_some() || field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        validate_image(&file_name, &content_type)?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            data.extend_from_slice(&chunk);
            if data.len() > max_bytes {
                return Err(too_large(max_bytes));
            }
        }

        debug!(file_name = %file_name, content_type = %content_type, size_bytes = data.len(), "received upload");
        image = Some(IncomingImage {
            file_name,
            content_type,
            data: data.freeze(),
        });
    }

    let image = image.ok_or_else(|| ServerError::BadRequest(NO_IMAGE.into()))?;
    let description = state.uploads.analyze(image).await?;

    Ok(Json(UploadImageResponse {
        message: UPLOAD_OK.to_owned(),
        description,
    }))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_bytes)
    } else {
        ServerError::BadRequest(format!("Failed to read multipart body: {}", e.body_text()))
    }
}

fn too_large(max_bytes: usize) -> ServerError {
    ServerError::PayloadTooLarge(format!(
        "Image exceeds the {} MiB upload limit.",
        max_bytes / (1024 * 1024)
    ))
}
