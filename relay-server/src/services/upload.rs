//! Image upload + analysis.
//!
//! Accepted uploads are written to the upload directory under a generated
//! name, read back and sent to the completion provider together with a fixed
//! system/user prompt pair. The file lives in a [`TempUpload`] guard and is
//! removed on every exit path once the analysis call returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use relay_providers::{ChatMessage, CompletionProvider, CompletionRequest, ImageAttachment};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ServerError;

pub const NO_IMAGE: &str = "No image was uploaded.";
pub const DISALLOWED_TYPE: &str = "Only image files (JPEG/PNG) are allowed.";
pub const ANALYSIS_FAILED: &str = "Failed to analyze image.";
pub const UPLOAD_OK: &str = "Image uploaded and analyzed successfully.";

const SYSTEM_PROMPT: &str =
    "You are an AI assistant that can analyze images and answer questions about them.";
const USER_PROMPT: &str = "Analyze this image.";

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpeg", "jpg", "png"];
const ALLOWED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// One file taken from the multipart body.
#[derive(Debug, Clone)]
pub struct IncomingImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Validate the client-declared name and media type.
///
/// Both must be on the allow-list; returns the lower-cased extension.
pub fn validate_image(file_name: &str, content_type: &str) -> Result<String, ServerError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let media_type = content_type.trim().to_ascii_lowercase();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str())
        && ALLOWED_MEDIA_TYPES.contains(&media_type.as_str())
    {
        Ok(extension)
    } else {
        debug!(file_name, content_type, "rejected upload type");
        Err(ServerError::BadRequest(DISALLOWED_TYPE.into()))
    }
}

/// Analyses uploaded images via the completion provider.
#[derive(Clone)]
pub struct UploadAnalyzer {
    provider: Arc<dyn CompletionProvider>,
    upload_dir: PathBuf,
    model: String,
}

impl UploadAnalyzer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        upload_dir: impl Into<PathBuf>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            upload_dir: upload_dir.into(),
            model: model.into(),
        }
    }

    /// Persist `image`, describe it, and delete the temporary file.
    pub async fn analyze(&self, image: IncomingImage) -> Result<String, ServerError> {
        let extension = validate_image(&image.file_name, &image.content_type)?;

        let temp = TempUpload::create(&self.upload_dir, &extension, &image.data).await?;
        info!(
            path = %temp.path().display(),
            original_name = %image.file_name,
            size_bytes = image.data.len(),
            "saved upload"
        );

        let result = self.describe(&temp, &extension).await;
        drop(temp);
        result
    }

    async fn describe(&self, temp: &TempUpload, extension: &str) -> Result<String, ServerError> {
        let data = tokio::fs::read(temp.path())
            .await
            .map_err(|e| ServerError::internal(ANALYSIS_FAILED, e))?;

        let media_type = if extension == "png" { "image/png" } else { "image/jpeg" };
        let request = CompletionRequest::new(
            self.model.as_str(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(USER_PROMPT)],
        )
        .with_image(ImageAttachment {
            media_type: media_type.to_owned(),
            data: Bytes::from(data),
        });

        let description = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| ServerError::internal(ANALYSIS_FAILED, e))?;
        info!(description_len = description.len(), "image analysis done");
        Ok(description)
    }
}

/// A file in the upload directory that is deleted when the guard drops.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `data` to `<dir>/<unix-millis>-<suffix>.<extension>`, creating
    /// `dir` if needed.
    pub async fn create(dir: &Path, extension: &str, data: &[u8]) -> Result<Self, ServerError> {
        tokio::fs::create_dir_all(dir).await?;
        Self::write(dir.join(unique_name(extension)), data).await
    }

    /// The guard exists before the first byte lands, so a failed or partial
    /// write is removed too.
    async fn write(path: PathBuf, data: &[u8]) -> Result<Self, ServerError> {
        let upload = Self { path };
        tokio::fs::write(&upload.path, data).await?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "upload never reached disk")
            }
            Err(e) => error!(path = %self.path.display(), error = %e, "failed to delete upload"),
        }
    }
}

fn unique_name(extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", Utc::now().timestamp_millis(), &suffix[..8], extension)
}
