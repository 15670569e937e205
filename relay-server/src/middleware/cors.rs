use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// CORS layer restricted to the configured origins; any origin when the list
/// is empty or none of the entries parse.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
