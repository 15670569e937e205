//! Provider-neutral request / response types shared by the relays.

use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── Chat ─────────────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single role-tagged text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Image attached to the last user message of a completion request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// Declared media type, e.g. `"image/png"`.
    pub media_type: String,
    pub data: Bytes,
}

impl ImageAttachment {
    pub fn data_uri(&self) -> String {
        data_uri(&self.media_type, &self.data)
    }
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// When set, sent alongside the text of the final user message.
    pub image: Option<ImageAttachment>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }
}

// ── Images ───────────────────────────────────────────────────────────────────

/// Output encoding requested from the image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// One image-generation call.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub format: ImageFormat,
}

/// Raw bytes returned by the image provider.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl GeneratedImage {
    /// `data:<media type>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        data_uri(self.format.media_type(), &self.bytes)
    }
}

fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{media_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
