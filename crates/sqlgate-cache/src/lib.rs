//! # sqlgate-cache
//!
//! TTL result cache for read statements. [`ResultCache`] sits in front of a
//! [`ResultStore`]; the in-memory store is the default, and any key-value
//! backend can take its place without touching the coordinator.

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{CacheHit, CacheKey, ResultCache, signature};
pub use error::CacheError;
pub use store::{CacheEntry, Clock, DisabledStore, MemoryStore, ResultStore, SystemClock};
