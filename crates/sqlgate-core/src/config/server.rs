//! HTTP server configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Header carrying the API key for bulk (text/plain) requests.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Upper bound on request bodies, bulk batches included.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_key_header() -> String {
    "GC2-API-KEY".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_header: default_api_key_header(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
