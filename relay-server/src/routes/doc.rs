use utoipa::OpenApi;

use crate::routes::{chat, health, images, upload};

#[derive(OpenApi)]
#[openapi(info(
    title = "relay-server",
    description = "Image generation, chat and image analysis relay",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(images::ImagesApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(upload::UploadApi::openapi());
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_public_route_is_documented() {
        let docs = get_docs();
        for path in [
            "/health",
            "/generate-image",
            "/api/chat",
            "/api/chat/{user_id}",
            "/upload-image",
        ] {
            assert!(docs.paths.paths.contains_key(path), "{path} missing from OpenAPI");
        }
    }
}
