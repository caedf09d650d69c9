//! Result cache configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, every `lifetime` is ignored and reads always hit the database.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requested lifetimes are clamped to this many seconds.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    /// Interval of the background sweep that drops expired entries.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_lifetime() -> u64 {
    86_400
}

fn default_purge_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_lifetime_secs: default_max_lifetime(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}
