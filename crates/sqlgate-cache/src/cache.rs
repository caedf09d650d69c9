//! The cache facade used by the coordinator.
//!
//! Lookups and stores never fail from the caller's point of view: backend
//! errors are logged and the request proceeds as a miss.

use crate::store::{DisabledStore, MemoryStore, ResultStore};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlgate_core::config::CacheConfig;
use sqlgate_core::envelope::{CacheHitInfo, CacheStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MIN_TTL: Duration = Duration::from_secs(1);

/// Deterministic key of a cacheable statement: a digest of the SQL text and
/// the requested lifetime. Only surrounding whitespace is ignored; anything
/// inside the statement may sit in a literal or a quoted identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(sql: &str, lifetime: Duration) -> Self {
        let material = format!("{}_{}", sql.trim(), lifetime.as_secs());
        Self(hex_digest(material.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex sha256 of a payload.
pub fn signature(payload: &[u8]) -> String {
    hex_digest(payload)
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A served cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signature: String,
}

impl CacheHit {
    pub fn status(&self) -> CacheStatus {
        CacheStatus::Hit(CacheHitInfo {
            created_at: self.created_at,
            signature: self.signature.clone(),
            expires_at: self.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn ResultStore>,
    max_lifetime: Duration,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("max_lifetime", &self.max_lifetime)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn ResultStore>, max_lifetime: Duration) -> Self {
        Self {
            store,
            max_lifetime,
        }
    }

    /// In-memory cache when enabled, otherwise a cache that never hits.
    pub fn from_config(config: &CacheConfig) -> Self {
        let store: Arc<dyn ResultStore> = if config.enabled {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(DisabledStore)
        };
        Self::new(store, Duration::from_secs(config.max_lifetime_secs))
    }

    /// A cache that never holds anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledStore), Duration::ZERO)
    }

    /// Lifetime actually handed to the store: clamped to the configured
    /// maximum and never below one second, since zero means "forever" there.
    pub fn effective_ttl(&self, requested: Duration) -> Duration {
        requested.min(self.max_lifetime).max(MIN_TTL)
    }

    pub fn key(&self, sql: &str, lifetime: Duration) -> CacheKey {
        CacheKey::new(sql, lifetime)
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheHit> {
        match self.store.get(key).await {
            Ok(Some(entry)) => {
                debug!(cache_key = %key, "cache hit");
                Some(CacheHit {
                    signature: signature(&entry.payload),
                    expires_at: entry.expires_at(),
                    created_at: entry.created_at,
                    payload: entry.payload,
                })
            }
            Ok(None) => {
                debug!(cache_key = %key, "cache miss");
                None
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "cache lookup failed, executing directly");
                None
            }
        }
    }

    /// Store a payload. A zero lifetime means the caller did not ask for
    /// caching and nothing is written.
    pub async fn store(&self, key: &CacheKey, payload: Vec<u8>, lifetime: Duration) {
        if lifetime.is_zero() {
            return;
        }
        let ttl = self.effective_ttl(lifetime);
        if let Err(e) = self.store.put(key, payload, ttl).await {
            warn!(cache_key = %key, error = %e, "cache store failed, result not cached");
        }
    }

    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "cache purge failed");
                0
            }
        }
    }
}
