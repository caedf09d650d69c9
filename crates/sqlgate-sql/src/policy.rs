//! Statement policy: the syntax pre-check, forbidden relations and
//! operation classification.

use crate::error::SqlError;
use crate::tree::{CreateKind, StatementTree};
use serde::Serialize;
use sqlgate_core::config::PolicyConfig;
use std::collections::HashSet;
use tracing::debug;

/// Reject text that could smuggle a second statement or comment out a
/// trailing clause. Runs before the parser sees anything.
pub fn precheck(sql: &str) -> Result<(), SqlError> {
    if sql.contains(';') {
        return Err(SqlError::SemicolonNotAllowed);
    }
    if sql.contains("--") {
        return Err(SqlError::CommentNotAllowed);
    }
    Ok(())
}

/// Whether a relation is read or written by the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Read,
    Write,
}

/// Relations that are never reachable, whatever the caller's privileges.
#[derive(Debug, Clone)]
pub struct ForbiddenRelations {
    schemas: HashSet<String>,
    tables: HashSet<String>,
}

impl Default for ForbiddenRelations {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl ForbiddenRelations {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            schemas: config
                .forbidden_schemas
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            tables: config
                .forbidden_tables
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    /// True when the schema segment or the table segment of `relation` is forbidden.
    pub fn is_forbidden(&self, relation: &str) -> bool {
        let lowered = relation.to_ascii_lowercase();
        let mut segments = lowered.rsplit('.');
        let table = segments.next().unwrap_or_default();
        let schema = segments.next();

        self.tables.contains(table) || schema.is_some_and(|s| self.schemas.contains(s))
    }

    /// Fail with a policy violation for a forbidden relation. Write targets
    /// report 406, everything else 403.
    pub fn check(&self, relation: &str, role: Role) -> Result<(), SqlError> {
        if self.is_forbidden(relation) {
            debug!(relation = %relation, ?role, "forbidden relation");
            let code = match role {
                Role::Read => 403,
                Role::Write => 406,
            };
            return Err(SqlError::ForbiddenRelation {
                relation: relation.to_string(),
                code,
            });
        }
        Ok(())
    }
}

/// Primary operation of an accepted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// SELECT or a set operation; cacheable and streamable.
    Read,
    /// INSERT, UPDATE, DELETE, or a query hiding one of them.
    Write,
    /// CREATE VIEW, CREATE TABLE or `SELECT ... INTO`; needs the account's own key.
    CreateWithKey,
}

impl Operation {
    /// Whether relations must be authorized for writing.
    pub fn requires_write(&self) -> bool {
        matches!(self, Operation::Write)
    }

    /// Whether the statement changes the database.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read)
    }
}

/// Classify a statement: DROP, then ALTER, then CREATE, then writes, then reads.
pub fn classify(tree: &StatementTree) -> Result<Operation, SqlError> {
    match tree {
        StatementTree::Drop(_) => Err(SqlError::DropNotAllowed),
        StatementTree::Alter(_) => Err(SqlError::AlterNotAllowed),
        StatementTree::Create(create) => match &create.kind {
            CreateKind::View | CreateKind::Table => Ok(Operation::CreateWithKey),
            CreateKind::Other(object) => Err(SqlError::CreateNotAllowed {
                object: object.clone(),
            }),
        },
        StatementTree::Insert(_) | StatementTree::Update(_) | StatementTree::Delete(_) => {
            Ok(Operation::Write)
        }
        StatementTree::Query(query) if query.created_table().is_some() => {
            Ok(Operation::CreateWithKey)
        }
        StatementTree::Query(query) if query.contains_modification() => Ok(Operation::Write),
        StatementTree::Query(_) => Ok(Operation::Read),
        StatementTree::Other(keyword) => Err(SqlError::Unrecognized {
            keyword: keyword.clone(),
        }),
    }
}
