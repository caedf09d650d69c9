use crate::error::{exec_error, transaction_error};
use crate::session;
use async_trait::async_trait;
use serde_json::Value;
use sqlgate_runtime::{ExecError, ExecKind, ExecOptions, ExecOutcome, SqlExecutor, Transaction};
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::time::Duration;
use tracing::debug;

/// Runs each statement in its own transaction on a pooled connection.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str, options: &ExecOptions) -> Result<ExecOutcome, ExecError> {
        let mut tx = self.pool.begin().await.map_err(exec_error)?;
        session::configure(&mut tx, options, self.statement_timeout).await?;
        let outcome = run(&mut tx, sql, options.kind).await?;
        tx.commit().await.map_err(transaction_error)?;
        Ok(outcome)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, ExecError> {
        let tx = self.pool.begin().await.map_err(exec_error)?;
        debug!("batch transaction opened");
        Ok(Box::new(PgTransaction {
            tx,
            statement_timeout: self.statement_timeout,
            configured: false,
        }))
    }
}

/// An explicit transaction spanning a bulk batch.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    statement_timeout: Option<Duration>,
    configured: bool,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(
        &mut self,
        sql: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutcome, ExecError> {
        // Session settings are transaction-local; the first statement sets them.
        if !self.configured {
            session::configure(&mut self.tx, options, self.statement_timeout).await?;
            self.configured = true;
        }
        run(&mut self.tx, sql, options.kind).await
    }

    async fn commit(self: Box<Self>) -> Result<(), ExecError> {
        self.tx.commit().await.map_err(transaction_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), ExecError> {
        self.tx.rollback().await.map_err(transaction_error)
    }
}

async fn run(conn: &mut PgConnection, sql: &str, kind: ExecKind) -> Result<ExecOutcome, ExecError> {
    match kind {
        ExecKind::Query => {
            let row = sqlx::query(&session::aggregate(sql))
                .fetch_one(&mut *conn)
                .await
                .map_err(exec_error)?;
            let data: Value = row.try_get("data").map_err(exec_error)?;
            Ok(ExecOutcome::rows(data))
        }
        ExecKind::Mutation => {
            let result = sqlx::query(sql)
                .execute(&mut *conn)
                .await
                .map_err(exec_error)?;
            Ok(ExecOutcome::affected(result.rows_affected()))
        }
    }
}
