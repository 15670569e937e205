use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /generate-image`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerateImageRequest {
    /// Text description of the desired image.
    #[serde(default)]
    pub prompt: String,
}

/// Response body for `POST /generate-image`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateImageResponse {
    /// `data:image/<format>;base64,...`
    pub image: String,
}
