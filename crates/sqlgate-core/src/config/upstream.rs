//! The Postgres database behind the gateway.

use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "postgresql://postgres@localhost:5432/postgres";

/// Where sqlgate sends authorized statements.
///
/// `url_env`, when set and present in the environment, replaces `url`.
/// TLS and other libpq options go in the URL query (`?sslmode=require`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    #[serde(default)]
    pub pool: PoolConfig,

    /// Applied with `SET LOCAL` inside every upstream transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            url_env: None,
            pool: PoolConfig::default(),
            statement_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// The URL to connect with.
    pub fn connection_url(&self) -> String {
        self.env_url().unwrap_or_else(|| self.url.clone())
    }

    /// True when the URL comes from `url_env`.
    pub fn url_from_env(&self) -> bool {
        self.env_url().is_some()
    }

    /// The connection target without credentials, for logs and summaries.
    pub fn display_target(&self) -> String {
        let url = self.connection_url();
        let target = match url.split_once("://") {
            Some((_, rest)) => rest.rsplit_once('@').map_or(rest, |(_, host)| host),
            None => url.as_str(),
        };
        target.to_string()
    }

    fn env_url(&self) -> Option<String> {
        let var = self.url_env.as_ref()?;
        std::env::var(var).ok().filter(|url| !url.is_empty())
    }
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}
