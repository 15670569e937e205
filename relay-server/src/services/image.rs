//! Text-to-image relay.

use std::sync::Arc;

use axum::http::StatusCode;
use relay_providers::{ImageFormat, ImageProvider, ImageRequest, ProviderError};
use tracing::{debug, info, warn};

use crate::error::{GENERIC_SERVER_ERROR, ServerError};

pub const EMPTY_PROMPT: &str = "Prompt must not be empty.";

/// Forwards prompts to the image provider and returns data URIs.
#[derive(Clone)]
pub struct ImageRelay {
    provider: Arc<dyn ImageProvider>,
    format: ImageFormat,
}

impl ImageRelay {
    pub fn new(provider: Arc<dyn ImageProvider>, format: ImageFormat) -> Self {
        Self { provider, format }
    }

    /// Generate one image for `prompt` and return it as
    /// `data:image/<format>;base64,...`.
    pub async fn generate(&self, prompt: &str) -> Result<String, ServerError> {
        if prompt.is_empty() {
            return Err(ServerError::BadRequest(EMPTY_PROMPT.into()));
        }
        debug!(prompt_len = prompt.len(), format = %self.format, "image generation request");

        let request = ImageRequest {
            prompt: prompt.to_owned(),
            format: self.format,
        };

        match self.provider.generate(&request).await {
            Ok(image) => {
                info!(image_bytes = image.bytes.len(), "image generation done");
                Ok(image.data_uri())
            }
            Err(ProviderError::Status { status, message }) => {
                warn!(status, message = %message, "image provider rejected request");
                Err(ServerError::Provider {
                    status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    message,
                })
            }
            Err(e) => Err(ServerError::internal(GENERIC_SERVER_ERROR, e)),
        }
    }
}
