use relay_providers::ChatMessage;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Caller-chosen identifier that scopes the conversation history.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    /// Assistant reply.
    pub response: String,
}

/// A stored transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranscriptMessage {
    /// `"user"`, `"assistant"` or `"system"`.
    pub role: String,
    pub content: String,
}

impl From<ChatMessage> for TranscriptMessage {
    fn from(m: ChatMessage) -> Self {
        Self {
            role: m.role.to_string(),
            content: m.content,
        }
    }
}

/// Response body for `GET /api/chat/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub user_id: String,
    pub messages: Vec<TranscriptMessage>,
}

/// Response body for `DELETE /api/chat/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearTranscriptResponse {
    /// `false` when no transcript existed for the user.
    pub cleared: bool,
}
