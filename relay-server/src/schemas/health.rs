use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when uploads cannot be stored.
    pub status: String,
    pub version: String,
    /// Chat transcripts currently held in memory.
    pub sessions: usize,
    pub upload_dir_writable: bool,
}
