//! Per-transaction session settings and statement wrapping.

use crate::error::exec_error;
use sqlgate_runtime::{ExecError, ExecOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::debug;

/// Apply `client_encoding` and `statement_timeout` for the current
/// transaction only.
pub(crate) async fn configure(
    conn: &mut PgConnection,
    options: &ExecOptions,
    statement_timeout: Option<Duration>,
) -> Result<(), ExecError> {
    if let Some(encoding) = options.client_encoding.as_deref() {
        debug!(encoding, "setting client encoding");
        set_local(conn, "client_encoding", encoding).await?;
    }
    if let Some(timeout) = statement_timeout {
        set_local(conn, "statement_timeout", &timeout.as_millis().to_string()).await?;
    }
    Ok(())
}

async fn set_local(conn: &mut PgConnection, name: &str, value: &str) -> Result<(), ExecError> {
    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(name)
        .bind(value)
        .execute(conn)
        .await
        .map_err(exec_error)?;
    Ok(())
}

/// Aggregate a read into a single JSON array.
pub(crate) fn aggregate(sql: &str) -> String {
    format!(
        "SELECT coalesce(json_agg(t), '[]'::json) AS data FROM ({}) AS t",
        sql
    )
}

/// One JSON object per row.
pub(crate) fn per_row(sql: &str) -> String {
    format!("SELECT to_jsonb(t) AS row FROM ({}) AS t", sql)
}
