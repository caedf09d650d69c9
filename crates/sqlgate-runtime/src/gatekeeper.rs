//! The statement pipeline: pre-check, parse, extract, classify, authorize.
//!
//! Each step returns a value or a terminal [`GateError`]; nothing runs
//! against the database until [`Gatekeeper::prepare`] has returned.

use crate::error::GateError;
use serde::Serialize;
use sqlgate_auth::{AccountDirectory, AuthResult, AuthorizationGate, Authorizer, Credentials};
use sqlgate_core::request::QueryRequest;
use sqlgate_sql::{
    Operation, PostgresParser, RelationExtractor, RelationSet, Section, SqlError, SqlParser,
    StatementTree, classify, precheck,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// The account a request runs against.
#[derive(Clone)]
pub struct AccountContext {
    pub name: String,
    /// Canonical key; CREATE VIEW/TABLE must present exactly this key.
    pub api_key: Option<String>,
    pub authorizer: Arc<dyn Authorizer>,
}

impl std::fmt::Debug for AccountContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AccountContext {
    pub fn new(
        name: impl Into<String>,
        api_key: Option<String>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key,
            authorizer,
        }
    }

    pub fn resolve(directory: &dyn AccountDirectory, name: &str) -> Result<Self, GateError> {
        let authorizer = directory
            .authorizer(name)
            .ok_or_else(|| GateError::Account(name.to_string()))?;
        Ok(Self::new(name, directory.api_key(name), authorizer))
    }

    fn key_matches(&self, supplied: Option<&str>) -> bool {
        match (self.api_key.as_deref(), supplied) {
            (Some(expected), Some(supplied)) => !expected.is_empty() && expected == supplied,
            _ => false,
        }
    }
}

/// A statement that passed every check before authorization.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub tree: StatementTree,
    pub sections: BTreeSet<Section>,
    pub operation: Operation,
    pub relations: RelationSet,
}

/// A statement cleared to run.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub sql: String,
    pub operation: Operation,
    pub relations: RelationSet,
    /// Last successful authorization result, if any relation was checked.
    pub auth: Option<AuthResult>,
}

#[derive(Clone)]
pub struct Gatekeeper {
    parser: Arc<dyn SqlParser>,
    extractor: RelationExtractor,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(Arc::new(PostgresParser::new()), RelationExtractor::default())
    }
}

impl Gatekeeper {
    pub fn new(parser: Arc<dyn SqlParser>, extractor: RelationExtractor) -> Self {
        Self { parser, extractor }
    }

    /// Everything up to and including classification. The forbidden-relation
    /// check runs during extraction, so it precedes every other policy rule.
    pub fn inspect(&self, sql: &str) -> Result<Inspection, SqlError> {
        precheck(sql)?;
        let tree = self.parser.parse(sql)?;
        let relations = self.extractor.extract(&tree)?;
        let operation = classify(&tree)?;
        Ok(Inspection {
            sections: tree.sections(),
            tree,
            operation,
            relations,
        })
    }

    /// Inspect, then authorize every relation and check the CREATE key.
    pub async fn prepare(
        &self,
        request: &QueryRequest,
        account: &AccountContext,
    ) -> Result<Prepared, GateError> {
        let inspection = self.inspect(&request.sql)?;
        debug!(
            account = %account.name,
            operation = ?inspection.operation,
            relations = inspection.relations.len(),
            "statement inspected"
        );

        let gate = AuthorizationGate::new(account.authorizer.as_ref());
        let credentials = Credentials {
            subuser: request.subuser.as_deref(),
            api_key: request.api_key.as_deref(),
        };
        let auth = gate
            .check(
                &inspection.relations,
                credentials,
                inspection.operation.requires_write(),
            )
            .await?;

        if inspection.operation == Operation::CreateWithKey
            && !account.key_matches(request.api_key.as_deref())
        {
            return Err(GateError::wrong_key());
        }

        Ok(Prepared {
            sql: request.sql.clone(),
            operation: inspection.operation,
            relations: inspection.relations,
            auth,
        })
    }
}
