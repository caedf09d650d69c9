//! `sqlgate serve`

use crate::logging;
use anyhow::Context;
use sqlgate_auth::ConfigDirectory;
use sqlgate_cache::ResultCache;
use sqlgate_core::SqlgateConfig;
use sqlgate_runtime::{Coordinator, Gatekeeper};
use sqlgate_server::{AppState, serve, spawn_purge_task};
use sqlgate_sql::{ForbiddenRelations, PostgresParser, RelationExtractor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = SqlgateConfig::resolve_path(config_path);
    let config = SqlgateConfig::load_from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    logging::init(&config.logging.level);
    info!(
        config = %path.display(),
        accounts = config.accounts.len(),
        cache = config.cache.enabled,
        "configuration loaded"
    );

    let pool = sqlgate_adapter_pg::connect(&config.upstream).await?;
    let (executor, streamer) = sqlgate_adapter_pg::collaborators(pool, &config.upstream);

    let gatekeeper = Gatekeeper::new(
        Arc::new(PostgresParser::new()),
        RelationExtractor::new(ForbiddenRelations::from_config(&config.policy)),
    );
    let cache = ResultCache::from_config(&config.cache);
    if config.cache.enabled {
        spawn_purge_task(
            cache.clone(),
            Duration::from_secs(config.cache.purge_interval_secs),
        );
    }
    let coordinator = Coordinator::new(gatekeeper, Arc::new(executor), Arc::new(streamer), cache);

    let directory = Arc::new(ConfigDirectory::new(&config.accounts));
    let state = Arc::new(AppState::new(coordinator, directory, &config.server)?);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    serve(listener, state).await
}
