//! Conversational chat routes.
//!
//! `POST /api/chat` runs one turn against the caller's transcript; the
//! transcript itself can be inspected or reset per user id.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::PlainTextError;
use crate::schemas::chat::{
    ChatRequest, ChatResponse, ClearTranscriptResponse, TranscriptResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(chat, get_transcript, clear_transcript))]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/{user_id}", get(get_transcript).delete(clear_transcript))
}

/// One chat turn (`POST /api/chat`).
///
/// Server failures are reported as a plain-text body.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Missing userId or message"),
        (status = 500, description = "Provider failure (plain text)"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, PlainTextError> {
    let req = payload.map(|Json(req)| req).unwrap_or_else(|rejection| {
        debug!(error = %rejection, "unreadable chat request body");
        ChatRequest::default()
    });

    let response = state.chat.chat(&req.user_id, &req.message).await?;
    Ok(Json(ChatResponse { response }))
}

/// Current transcript of one user (`GET /api/chat/{userId}`).
#[utoipa::path(
    get,
    path = "/api/chat/{user_id}",
    tag = "chat",
    params(("user_id" = String, Path, description = "Conversation owner")),
    responses((status = 200, description = "Transcript in send order", body = TranscriptResponse))
)]
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<TranscriptResponse> {
    let messages = state.sessions.peek(&user_id).await;
    Json(TranscriptResponse {
        user_id,
        messages: messages.into_iter().map(Into::into).collect(),
    })
}

/// Forget one user's transcript (`DELETE /api/chat/{userId}`).
#[utoipa::path(
    delete,
    path = "/api/chat/{user_id}",
    tag = "chat",
    params(("user_id" = String, Path, description = "Conversation owner")),
    responses((status = 200, description = "Transcript removed", body = ClearTranscriptResponse))
)]
pub async fn clear_transcript(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<ClearTranscriptResponse> {
    Json(ClearTranscriptResponse {
        cleared: state.sessions.clear(&user_id).await,
    })
}
