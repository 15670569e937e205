//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use relay_providers::{CompletionProvider, ImageProvider, OpenAiClient, StabilityClient};

use crate::config::Config;
use crate::services::{ChatRelay, ImageRelay, UploadAnalyzer};
use crate::session::SessionStore;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Per-user chat transcripts.
    pub sessions: Arc<SessionStore>,
    pub images: ImageRelay,
    pub chat: ChatRelay,
    pub uploads: UploadAnalyzer,
}

impl AppState {
    /// Wire the relays to the real HTTP provider clients.
    pub fn from_config(config: Config) -> Result<Self, relay_providers::ProviderError> {
        let images = StabilityClient::new(
            config.stability_api_key.as_str(),
            config.stability_base_url.as_str(),
            config.provider_timeout,
        )?;
        let completions = OpenAiClient::new(
            config.openai_api_key.as_str(),
            config.openai_base_url.as_str(),
            config.provider_timeout,
        )?;
        Ok(Self::with_providers(
            config,
            Arc::new(images),
            Arc::new(completions),
        ))
    }

    /// Wire the relays to arbitrary providers.
    pub fn with_providers(
        config: Config,
        image_provider: Arc<dyn ImageProvider>,
        completion_provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session));
        Self {
            images: ImageRelay::new(image_provider, config.image_format),
            chat: ChatRelay::new(
                Arc::clone(&completion_provider),
                Arc::clone(&sessions),
                config.chat_model.as_str(),
                config.chat_system_prompt.clone(),
            ),
            uploads: UploadAnalyzer::new(
                completion_provider,
                config.upload_dir.clone(),
                config.vision_model.as_str(),
            ),
            sessions,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
