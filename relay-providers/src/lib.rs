//! Upstream provider clients used by relay-server.
//!
//! Each provider sits behind a small async trait so the server can be driven
//! by the real HTTP clients in production and by in-process fakes in tests:
//!
//! - [`ImageProvider`] – prompt in, raw image bytes out ([`StabilityClient`]).
//! - [`CompletionProvider`] – transcript in, assistant text out ([`OpenAiClient`]).

pub mod error;
pub mod openai;
pub mod stability;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

pub use error::ProviderError;
pub use openai::OpenAiClient;
pub use stability::StabilityClient;
pub use types::{
    ChatMessage, CompletionRequest, GeneratedImage, ImageAttachment, ImageFormat, ImageRequest,
    Role,
};

/// Text-to-image generation.
#[async_trait]
pub trait ImageProvider: Send + Sync + 'static {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError>;
}

/// Chat completion over a full transcript, optionally with one attached image.
#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    /// Returns the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

pub(crate) fn http_client(timeout: Option<Duration>) -> Result<Client, ProviderError> {
    let mut builder =
        Client::builder().user_agent(concat!("relay-providers/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
