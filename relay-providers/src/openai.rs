//! OpenAI-compatible `chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::stability::UNKNOWN_ERROR;
use crate::types::{ChatMessage, CompletionRequest, Role};
use crate::{CompletionProvider, http_client};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completion client for the OpenAI REST API (or any compatible server).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
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
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = WireRequest::from_request(request);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!(
            status = status.as_u16(),
            model = %request.model,
            messages = request.messages.len(),
            "completion response"
        );

        if !status.is_success() {
            let message = serde_json::from_slice::<WireErrorBody>(&bytes)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| UNKNOWN_ERROR.to_owned());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WireResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Malformed(format!("invalid completion body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("completion has no message content".into()))
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Serialize)]
struct WireImageUrl {
    url: String,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a CompletionRequest) -> Self {
        let image_target = request
            .image
            .as_ref()
            .and_then(|_| request.messages.iter().rposition(|m| m.role == Role::User));

        let messages = request
            .messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| match (&request.image, image_target) {
                (Some(image), Some(target)) if target == idx => WireMessage {
                    role: msg.role,
                    content: WireContent::Parts(vec![
                        WirePart::Text { text: &msg.content },
                        WirePart::ImageUrl {
                            image_url: WireImageUrl {
                                url: image.data_uri(),
                            },
                        },
                    ]),
                },
                _ => WireMessage::text(msg),
            })
            .collect();

        Self {
            model: &request.model,
            messages,
        }
    }
}

impl<'a> WireMessage<'a> {
    fn text(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: WireContent::Text(&msg.content),
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
}
