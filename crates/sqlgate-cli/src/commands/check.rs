//! `sqlgate check-config`

use sqlgate_core::{RelationAccess, SqlgateConfig};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = SqlgateConfig::resolve_path(config_path);
    let config = SqlgateConfig::load_from_file(&path)?;
    println!("{}: ok", path.display());
    for line in summary(&config) {
        println!("  {}", line);
    }
    Ok(())
}

pub fn summary(config: &SqlgateConfig) -> Vec<String> {
    let mut lines = vec![
        format!("bind: {}", config.server.bind),
        format!(
            "upstream: {}{}",
            config.upstream.display_target(),
            if config.upstream.url_from_env() {
                " (from environment)"
            } else {
                ""
            }
        ),
        if config.cache.enabled {
            format!(
                "cache: enabled, max lifetime {}s, purge every {}s",
                config.cache.max_lifetime_secs, config.cache.purge_interval_secs
            )
        } else {
            "cache: disabled".to_string()
        },
        format!(
            "forbidden: schemas [{}], tables [{}]",
            config.policy.forbidden_schemas.join(", "),
            config.policy.forbidden_tables.join(", ")
        ),
    ];

    let mut names: Vec<_> = config.accounts.keys().collect();
    names.sort();
    for name in names {
        let account = &config.accounts[name];
        let private = account
            .relations
            .values()
            .filter(|a| **a == RelationAccess::Private)
            .count();
        lines.push(format!(
            "account {}: {} relations ({} private), {} subusers",
            name,
            account.relations.len(),
            private,
            account.subusers.len()
        ));
    }
    lines
}
