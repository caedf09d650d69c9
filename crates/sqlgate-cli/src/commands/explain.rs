//! `sqlgate explain` - offline inspection of one statement.

use crate::logging;
use serde_json::{Value, json};
use sqlgate_core::{PolicyConfig, SqlgateConfig};
use sqlgate_runtime::Gatekeeper;
use sqlgate_sql::{ForbiddenRelations, PostgresParser, RelationExtractor};
use std::path::Path;
use std::sync::Arc;

pub fn run(sql: &str, config_path: Option<&Path>) -> anyhow::Result<()> {
    logging::init("warn");
    let policy = load_policy(config_path)?;
    println!("{}", serde_json::to_string_pretty(&explain(sql, &policy))?);
    Ok(())
}

/// Policy from the config file when one exists, otherwise the defaults.
fn load_policy(config_path: Option<&Path>) -> anyhow::Result<PolicyConfig> {
    let path = SqlgateConfig::resolve_path(config_path);
    if config_path.is_none() && !path.exists() {
        return Ok(PolicyConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(SqlgateConfig::from_yaml(&raw)?.policy)
}

pub fn explain(sql: &str, policy: &PolicyConfig) -> Value {
    let gatekeeper = Gatekeeper::new(
        Arc::new(PostgresParser::new()),
        RelationExtractor::new(ForbiddenRelations::from_config(policy)),
    );
    match gatekeeper.inspect(sql) {
        Ok(inspection) => json!({
            "success": true,
            "operation": inspection.operation,
            "sections": inspection.sections,
            "relations": inspection.relations,
            "tree": inspection.tree,
        }),
        Err(err) => json!({
            "success": false,
            "code": err.code(),
            "message": err.to_string(),
        }),
    }
}
