use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart form accepted by `POST /upload-image`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadImageForm {
    /// JPEG or PNG file.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// Response body for `POST /upload-image`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadImageResponse {
    pub message: String,
    /// Provider-generated description of the image.
    pub description: String,
}
