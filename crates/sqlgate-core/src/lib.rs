//! # sqlgate-core
//!
//! Types shared by every sqlgate crate: the YAML configuration model, the
//! normalized [`QueryRequest`] and the [`ResponseEnvelope`] returned to callers.

pub mod config;
pub mod envelope;
pub mod request;

pub use config::{
    AccountConfig, CacheConfig, ConfigError, LoggingConfig, PolicyConfig, Privilege,
    RelationAccess, ServerConfig, SqlgateConfig, SubuserConfig, UpstreamConfig,
};
pub use envelope::{CacheHitInfo, CacheStatus, ResponseEnvelope};
pub use request::{GeoFormat, OutputFormat, QueryRequest, UnsupportedValue};
