//! Cache error types.

use thiserror::Error;

/// Failures of a cache backend. Never surfaced to callers: the cache
/// facade logs them and carries on without caching.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}
