//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** internal errors are logged with full detail but only a
//! fixed public message is returned to the caller so that provider payloads,
//! file paths, or credentials never leak to clients.

use std::fmt::Display;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Generic message for unexpected failures.
pub const GENERIC_SERVER_ERROR: &str = "A server error occurred.";

/// All errors that can occur in the relay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An upload exceeded the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The upstream provider answered with a structured error; its status and
    /// message are passed through to the caller.
    #[error("provider error ({status}): {message}")]
    Provider { status: StatusCode, message: String },

    /// Transport failure or unexpected condition. `public` is what the
    /// caller sees, `detail` only reaches the logs.
    #[error("{public} ({detail})")]
    Internal { public: &'static str, detail: String },

    /// Local filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn internal(public: &'static str, detail: impl Display) -> Self {
        ServerError::Internal {
            public,
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Provider { status, .. } => *status,
            ServerError::Internal { .. } | ServerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller; logs internal detail as a side effect.
    fn client_message(&self) -> String {
        match self {
            ServerError::BadRequest(m) | ServerError::PayloadTooLarge(m) => m.clone(),
            ServerError::Provider { message, .. } => message.clone(),
            ServerError::Internal { public, detail } => {
                error!(error = %detail, "{public}");
                (*public).to_owned()
            }
            ServerError::Io(e) => {
                error!(error = %e, "filesystem error");
                GENERIC_SERVER_ERROR.to_owned()
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.client_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Responder for endpoints whose server failures are plain text rather than
/// JSON. Client errors keep the JSON `{ "error": ... }` shape.
#[derive(Debug)]
pub struct PlainTextError(pub ServerError);

impl From<ServerError> for PlainTextError {
    fn from(e: ServerError) -> Self {
        PlainTextError(e)
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            (status, self.0.client_message()).into_response()
        } else {
            self.0.into_response()
        }
    }
}
