//! Error types for the SQL crate.

use thiserror::Error;

/// Where a rejection belongs in the gateway's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Disallowed syntax or unparsable text.
    Validation,
    /// Hard policy rule (forbidden relation, DROP/ALTER, CREATE of other kinds).
    Policy,
    /// Not recognised as any supported statement.
    Classification,
}

/// Terminal rejections raised before a statement reaches authorization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("You can't use ';'. Use the bulk transaction API instead")]
    SemicolonNotAllowed,

    #[error("SQL comments '--' are not allowed")]
    CommentNotAllowed,

    /// SQL parsing failed.
    #[error("{0}")]
    Parse(String),

    /// Statement touches a relation that is never reachable through the API.
    #[error("Can't complete the query")]
    ForbiddenRelation { relation: String, code: u16 },

    #[error("DROP is not allowed through the API")]
    DropNotAllowed,

    #[error("ALTER is not allowed through the API")]
    AlterNotAllowed,

    #[error("Only CREATE VIEW is allowed through the API")]
    CreateNotAllowed { object: String },

    #[error("Check your SQL. Could not recognise it as either SELECT, INSERT, UPDATE or DELETE")]
    Unrecognized { keyword: String },
}

impl SqlError {
    /// Numeric status code surfaced to the caller.
    pub fn code(&self) -> u16 {
        match self {
            SqlError::ForbiddenRelation { code, .. } => *code,
            SqlError::Unrecognized { .. } => 400,
            _ => 403,
        }
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            SqlError::SemicolonNotAllowed | SqlError::CommentNotAllowed | SqlError::Parse(_) => {
                RejectionKind::Validation
            }
            SqlError::Unrecognized { .. } => RejectionKind::Classification,
            _ => RejectionKind::Policy,
        }
    }
}
