//! The authorization gate: one authorizer call per relation, first denial wins.

use crate::authorizer::{AuthRequest, AuthResult, Authorizer};
use sqlgate_sql::RelationSet;
use thiserror::Error;
use tracing::{debug, warn};

/// A relation failed authorization.
#[derive(Debug, Clone, Error)]
#[error("{}", .result.message.as_deref().unwrap_or("Forbidden"))]
pub struct AuthDenied {
    pub relation: String,
    pub result: AuthResult,
}

impl AuthDenied {
    pub fn code(&self) -> u16 {
        self.result.code
    }
}

/// Caller identity shared by every check of one statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub subuser: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

pub struct AuthorizationGate<'a> {
    authorizer: &'a dyn Authorizer,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(authorizer: &'a dyn Authorizer) -> Self {
        Self { authorizer }
    }

    /// Authorize every relation in discovery order.
    ///
    /// Returns the last result when all pass (`None` for a statement without
    /// relations). Stops at the first denial without asking about the rest.
    pub async fn check(
        &self,
        relations: &RelationSet,
        credentials: Credentials<'_>,
        require_write: bool,
    ) -> Result<Option<AuthResult>, AuthDenied> {
        let known = relations.names();
        let mut last = None;

        for relation in relations {
            let request = AuthRequest {
                relation: &relation.name,
                subuser: credentials.subuser,
                require_write,
                api_key: credentials.api_key,
                known_relations: &known,
            };
            let result = self.authorizer.authorize(&request).await;
            debug!(
                relation = %relation.name,
                require_write,
                success = result.success,
                code = result.code,
                "authorization check"
            );
            if !result.success {
                warn!(relation = %relation.name, code = result.code, "authorization denied");
                return Err(AuthDenied {
                    relation: relation.name.clone(),
                    result,
                });
            }
            last = Some(result);
        }

        Ok(last)
    }
}
