//! Statement policy configuration.
//!
//! Relations in these namespaces can never be reached through the API,
//! whatever the authorizer decides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Schemas whose relations are always rejected.
    #[serde(default = "default_forbidden_schemas")]
    pub forbidden_schemas: Vec<String>,

    /// Table names rejected in any schema, qualified or not.
    #[serde(default = "default_forbidden_tables")]
    pub forbidden_tables: Vec<String>,
}

fn default_forbidden_schemas() -> Vec<String> {
    vec![
        "settings".to_string(),
        "information_schema".to_string(),
        "sqlapi".to_string(),
        "pg_catalog".to_string(),
    ]
}

fn default_forbidden_tables() -> Vec<String> {
    vec!["geometry_columns".to_string()]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_schemas: default_forbidden_schemas(),
            forbidden_tables: default_forbidden_tables(),
        }
    }
}
