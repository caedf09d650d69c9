use crate::error::exec_error;
use crate::session;
use futures::StreamExt;
use serde_json::Value;
use sqlgate_runtime::{ExecOptions, RowStream, RowStreamer};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, warn};

/// Streams read results row by row from a read-only transaction.
#[derive(Debug, Clone)]
pub struct PgStreamer {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgStreamer {
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

impl RowStreamer for PgStreamer {
    fn stream(&self, sql: String, options: ExecOptions) -> RowStream {
        let pool = self.pool.clone();
        let statement_timeout = self.statement_timeout;

        let rows = async_stream::stream! {
            let mut tx = match pool.begin().await {
                Ok(tx) => tx,
                Err(e) => {
                    yield Err(exec_error(e));
                    return;
                }
            };
            if let Err(e) = session::configure(&mut tx, &options, statement_timeout).await {
                yield Err(e);
                return;
            }

            let wrapped = session::per_row(&sql);
            let mut emitted = 0u64;
            let mut fetch = sqlx::query(&wrapped).fetch(&mut *tx);
            while let Some(next) = fetch.next().await {
                match next.and_then(|row| row.try_get::<Value, _>("row")) {
                    Ok(row) => {
                        emitted += 1;
                        yield Ok(row);
                    }
                    Err(e) => {
                        warn!(emitted, error = %e, "row stream aborted");
                        yield Err(exec_error(e));
                        break;
                    }
                }
            }
            drop(fetch);
            debug!(emitted, "row stream finished");
            // Nothing was written; dropping the transaction rolls it back.
        };

        rows.boxed()
    }
}
