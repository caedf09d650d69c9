//! Postgres implementation of the sqlgate database collaborators.
//!
//! Reads are aggregated server-side into one JSON array, mutations report
//! their affected-row count, and streamed reads emit one JSON object per row.

mod error;
mod executor;
mod session;
mod stream;

pub use error::exec_error;
pub use executor::{PgExecutor, PgTransaction};
pub use stream::PgStreamer;

use sqlgate_core::config::UpstreamConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

/// Open a connection pool for the configured upstream.
pub async fn connect(config: &UpstreamConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.pool.min_connections)
        .max_connections(config.pool.max_connections)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
        .connect(&config.connection_url())
        .await?;
    info!(
        upstream = %config.display_target(),
        max_connections = config.pool.max_connections,
        url_from_env = config.url_from_env(),
        "connected to upstream database"
    );
    Ok(pool)
}

/// Executor and streamer sharing one pool.
pub fn collaborators(pool: PgPool, config: &UpstreamConfig) -> (PgExecutor, PgStreamer) {
    let timeout = config.statement_timeout_ms.map(Duration::from_millis);
    (
        PgExecutor::new(pool.clone()).with_statement_timeout(timeout),
        PgStreamer::new(pool).with_statement_timeout(timeout),
    )
}
