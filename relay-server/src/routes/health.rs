//! Liveness endpoint with a short summary of relay state.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::health::HealthResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat (`GET /health`).
///
/// Always answers 200 while the process is serving; `status` turns
/// `"degraded"` when the upload directory is missing or read-only.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Relay is serving", body = HealthResponse))
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let upload_dir_writable = is_writable_dir(&state.config.upload_dir).await;
    Json(HealthResponse {
        status: if upload_dir_writable { "ok" } else { "degraded" }.to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        sessions: state.sessions.len(),
        upload_dir_writable,
    })
}

async fn is_writable_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_dir() && !m.permissions().readonly())
}
