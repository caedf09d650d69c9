//! Database collaborator boundary.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlgate_core::request::{GeoFormat, OutputFormat, QueryRequest};
use thiserror::Error;

/// Failures reported by the database collaborator.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The database rejected the statement.
    #[error("{0}")]
    Statement(String),

    #[error("database unavailable: {0}")]
    Connection(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl ExecError {
    pub fn code(&self) -> u16 {
        match self {
            ExecError::Statement(_) => 400,
            ExecError::Connection(_) => 503,
            ExecError::Transaction(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecKind {
    /// Returns rows.
    Query,
    /// Returns an affected-row count.
    Mutation,
}

/// Output options passed through to the executor unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub kind: ExecKind,
    pub client_encoding: Option<String>,
    pub format: OutputFormat,
    pub geoformat: Option<GeoFormat>,
    pub all_to_str: bool,
    pub alias: bool,
    pub srs: String,
}

impl ExecOptions {
    pub fn from_request(request: &QueryRequest, kind: ExecKind) -> Self {
        Self {
            kind,
            client_encoding: request.client_encoding.clone(),
            format: request.format,
            geoformat: request.geoformat,
            all_to_str: request.all_to_str,
            alias: request.alias,
            srs: request.srs.clone(),
        }
    }
}

/// What one statement produced. This is also the cached payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ExecOutcome {
    pub fn rows(data: Value) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn affected(rows: u64) -> Self {
        Self {
            affected_rows: Some(rows),
            ..Default::default()
        }
    }
}

/// Runs statements, each in its own implicit transaction, or opens an
/// explicit transaction for a batch.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, options: &ExecOptions) -> Result<ExecOutcome, ExecError>;

    async fn begin(&self) -> Result<Box<dyn Transaction>, ExecError>;
}

/// An open transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(
        &mut self,
        sql: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutcome, ExecError>;

    async fn commit(self: Box<Self>) -> Result<(), ExecError>;

    async fn rollback(self: Box<Self>) -> Result<(), ExecError>;
}

pub type RowStream = BoxStream<'static, Result<Value, ExecError>>;

/// Emits query rows one at a time instead of materializing the result.
pub trait RowStreamer: Send + Sync {
    fn stream(&self, sql: String, options: ExecOptions) -> RowStream;
}
