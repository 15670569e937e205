//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (per-request trace-ID injection, CORS)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `RELAY_ENABLE_SWAGGER=false`)
//! - Health route
//! - The relay routes (`/generate-image`, `/api/chat`, `/upload-image`)
//! - Read-only static serving of the upload directory under `/uploads`

mod chat;
pub mod doc;
mod health;
mod images;
mod upload;


use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(images::router())
        .merge(chat::router())
        .merge(upload::router(&state.config))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir));

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(
        // Outermost layers execute first on the way in.
        ServiceBuilder::new()
            .layer(middleware::from_fn(trace::trace_middleware))
            .layer(cors::cors_layer(&state.config)),
    )
    .with_state(state)
}
