use anyhow::Context;
use axum::http::HeaderName;
use sqlgate_auth::AccountDirectory;
use sqlgate_core::config::ServerConfig;
use sqlgate_runtime::Coordinator;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub coordinator: Coordinator,
    pub directory: Arc<dyn AccountDirectory>,
    /// Header carrying the API key for bulk requests.
    pub api_key_header: HeaderName,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        coordinator: Coordinator,
        directory: Arc<dyn AccountDirectory>,
        config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let api_key_header = HeaderName::from_bytes(config.api_key_header.as_bytes())
            .with_context(|| format!("invalid api_key_header '{}'", config.api_key_header))?;
        Ok(Self {
            coordinator,
            directory,
            api_key_header,
            max_body_bytes: config.max_body_bytes,
        })
    }
}
