//! The authorizer boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One authorization question: may this caller touch this relation?
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub relation: &'a str,
    pub subuser: Option<&'a str>,
    pub require_write: bool,
    pub api_key: Option<&'a str>,
    /// Every relation the statement references, for set-aware decisions.
    pub known_relations: &'a [String],
}

/// Answer to one [`AuthRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub code: u16,
    /// Authorizer-specific fields, surfaced to the caller under `auth_check`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AuthResult {
    pub fn granted() -> Self {
        Self {
            success: true,
            message: None,
            code: 200,
            details: Map::new(),
        }
    }

    pub fn denied(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            code,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Every field except `code`.
    pub fn auth_check(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("success".to_string(), Value::Bool(self.success));
        if let Some(message) = &self.message {
            out.insert("message".to_string(), Value::String(message.clone()));
        }
        for (k, v) in &self.details {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Decides whether a caller may read or write a relation.
///
/// Implementations must not fail: any internal error is a denial.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &AuthRequest<'_>) -> AuthResult;
}

/// Grants everything. Used by `explain` and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _request: &AuthRequest<'_>) -> AuthResult {
        AuthResult::granted().with_detail("auth_level", "allow_all")
    }
}
