//! Configuration types for sqlgate.
//!
//! Everything lives in one YAML file (`sqlgate.yaml` by default):
//!
//! - **server**: bind address, API key header, body limit
//! - **upstream**: the Postgres database behind the gateway
//! - **cache**: result cache switches and bounds
//! - **policy**: forbidden schemas and tables
//! - **logging**: default tracing filter
//! - **accounts**: API keys, subusers and relation access levels

pub mod accounts;
pub mod cache;
pub mod logging;
pub mod policy;
pub mod server;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use accounts::{AccountConfig, Privilege, RelationAccess, SubuserConfig};
pub use cache::CacheConfig;
pub use logging::LoggingConfig;
pub use policy::PolicyConfig;
pub use server::ServerConfig;
pub use upstream::{PoolConfig, UpstreamConfig};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "SQLGATE_CONFIG";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sqlgate.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete sqlgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlgateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

impl SqlgateConfig {
    /// Load and validate a configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Resolve the configuration path: explicit argument, then `SQLGATE_CONFIG`,
    /// then `sqlgate.yaml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one account must be configured".to_string(),
            ));
        }
        for (name, account) in &self.accounts {
            if name.contains('@') {
                return Err(ConfigError::Invalid(format!(
                    "account name '{}' must not contain '@'",
                    name
                )));
            }
            if account.resolve_api_key().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "account '{}' has no API key (set api_key or api_key_env)",
                    name
                )));
            }
        }
        if self.cache.enabled && self.cache.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.purge_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.get(name)
    }
}
