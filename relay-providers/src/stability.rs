//! Stability AI "stable-image" client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{GeneratedImage, ImageRequest};
use crate::{ImageProvider, http_client};

pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

const GENERATE_PATH: &str = "/v2beta/stable-image/generate/core";

/// Message used when a failed response carries no usable error text.
pub const UNKNOWN_ERROR: &str = "Unknown error occurred.";

/// Image-generation client for the Stability REST API.
#[derive(Debug, Clone)]
pub struct StabilityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StabilityClient {
    /// Build a client against `base_url` (no trailing slash required).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_PATH)
    }
}

#[async_trait]
impl ImageProvider for StabilityClient {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("output_format", request.format.to_string());

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        debug!(status = status.as_u16(), body_bytes = body.len(), "stability response");

        if status == StatusCode::OK {
            return Ok(GeneratedImage {
                format: request.format,
                bytes: body,
            });
        }

        Err(ProviderError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<serde_json::Value>,
}

/// First entry of the `errors` array, or [`UNKNOWN_ERROR`] when the body has
/// another shape. A non-string entry is rendered as compact JSON so the
/// relayed `error` field is always a string.
fn error_message(body: &[u8]) -> String {
    let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) else {
        return UNKNOWN_ERROR.to_owned();
    };
    match parsed.errors.into_iter().next() {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
            UNKNOWN_ERROR.to_owned()
        }
        Some(other) => other.to_string(),
    }
}
