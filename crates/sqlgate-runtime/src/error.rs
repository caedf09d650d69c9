//! Gateway error taxonomy.

use crate::executor::ExecError;
use serde_json::{Map, Value};
use sqlgate_auth::AuthDenied;
use sqlgate_sql::{RejectionKind, SqlError};
use thiserror::Error;

/// Every way a statement can be turned away or fail.
#[derive(Debug, Error)]
pub enum GateError {
    /// Disallowed syntax or unparsable SQL.
    #[error("{message}")]
    Validation { code: u16, message: String },

    /// Forbidden relation, DROP/ALTER, CREATE of another kind, wrong key.
    #[error("{message}")]
    Policy { code: u16, message: String },

    /// A relation failed authorization; carries the authorizer's own answer.
    #[error("{message}")]
    Authorization {
        code: u16,
        message: String,
        auth_check: Map<String, Value>,
    },

    #[error("{message}")]
    Classification { code: u16, message: String },

    #[error(transparent)]
    Execution(#[from] ExecError),

    /// Malformed request parameters.
    #[error("{0}")]
    Request(String),

    #[error("Account '{0}' not found")]
    Account(String),
}

impl GateError {
    pub fn wrong_key() -> Self {
        GateError::Policy {
            code: 403,
            message: "Not the right key!".to_string(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            GateError::Validation { code, .. }
            | GateError::Policy { code, .. }
            | GateError::Authorization { code, .. }
            | GateError::Classification { code, .. } => *code,
            GateError::Execution(e) => e.code(),
            GateError::Request(_) => 400,
            GateError::Account(_) => 404,
        }
    }
}

impl From<SqlError> for GateError {
    fn from(err: SqlError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err.kind() {
            RejectionKind::Validation => GateError::Validation { code, message },
            RejectionKind::Policy => GateError::Policy { code, message },
            RejectionKind::Classification => GateError::Classification { code, message },
        }
    }
}

impl From<AuthDenied> for GateError {
    fn from(denied: AuthDenied) -> Self {
        GateError::Authorization {
            code: denied.code(),
            message: denied.to_string(),
            auth_check: denied.result.auth_check(),
        }
    }
}
