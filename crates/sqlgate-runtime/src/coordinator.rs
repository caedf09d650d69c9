//! Execution coordinator: single, bulk and streaming modes.

use crate::envelope::EnvelopeBuilder;
use crate::error::GateError;
use crate::executor::{
    ExecKind, ExecOptions, ExecOutcome, RowStream, RowStreamer, SqlExecutor, Transaction,
};
use crate::gatekeeper::{AccountContext, Gatekeeper, Prepared};
use sqlgate_cache::ResultCache;
use sqlgate_core::envelope::{CacheStatus, ResponseEnvelope};
use sqlgate_core::request::QueryRequest;
use sqlgate_sql::Operation;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of asking for a streamed response.
pub enum StreamOutcome {
    /// Rows to emit one by one.
    Rows(RowStream),
    /// The statement was rejected, or was not a read and ran in single mode.
    Envelope(ResponseEnvelope),
}

pub struct Coordinator {
    gatekeeper: Gatekeeper,
    executor: Arc<dyn SqlExecutor>,
    streamer: Arc<dyn RowStreamer>,
    cache: ResultCache,
    envelopes: EnvelopeBuilder,
}

impl Coordinator {
    pub fn new(
        gatekeeper: Gatekeeper,
        executor: Arc<dyn SqlExecutor>,
        streamer: Arc<dyn RowStreamer>,
        cache: ResultCache,
    ) -> Self {
        Self {
            gatekeeper,
            executor,
            streamer,
            cache,
            envelopes: EnvelopeBuilder::default(),
        }
    }

    pub fn with_envelopes(mut self, envelopes: EnvelopeBuilder) -> Self {
        self.envelopes = envelopes;
        self
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn failure(&self, err: &GateError) -> ResponseEnvelope {
        self.envelopes.failure(err)
    }

    /// One statement in one implicit transaction.
    pub async fn run_single(
        &self,
        request: &QueryRequest,
        account: &AccountContext,
    ) -> ResponseEnvelope {
        let result = match self.gatekeeper.prepare(request, account).await {
            Ok(prepared) => self.execute_prepared(request, &prepared, account).await,
            Err(err) => Err(err),
        };
        self.settle(result, account)
    }

    fn settle(
        &self,
        result: Result<ResponseEnvelope, GateError>,
        account: &AccountContext,
    ) -> ResponseEnvelope {
        match result {
            Ok(envelope) => envelope,
            Err(err) => {
                info!(account = %account.name, code = err.code(), error = %err, "statement rejected");
                self.envelopes.failure(&err)
            }
        }
    }

    /// Run a statement that already passed the gatekeeper.
    async fn execute_prepared(
        &self,
        request: &QueryRequest,
        prepared: &Prepared,
        account: &AccountContext,
    ) -> Result<ResponseEnvelope, GateError> {
        if prepared.operation == Operation::Read {
            return self.run_read(request, prepared).await;
        }

        let options = ExecOptions::from_request(request, ExecKind::Mutation);
        let outcome = self.executor.execute(&prepared.sql, &options).await?;
        info!(
            account = %account.name,
            operation = ?prepared.operation,
            affected_rows = outcome.affected_rows,
            "statement executed"
        );
        Ok(self
            .envelopes
            .success(outcome, prepared.auth.as_ref(), None))
    }

    async fn run_read(
        &self,
        request: &QueryRequest,
        prepared: &Prepared,
    ) -> Result<ResponseEnvelope, GateError> {
        let options = ExecOptions::from_request(request, ExecKind::Query);

        if !request.wants_cache() {
            let outcome = self.executor.execute(&prepared.sql, &options).await?;
            return Ok(self
                .envelopes
                .success(outcome, prepared.auth.as_ref(), None));
        }

        let key = self.cache.key(&prepared.sql, request.lifetime);
        if let Some(hit) = self.cache.lookup(&key).await {
            match serde_json::from_slice::<ExecOutcome>(&hit.payload) {
                Ok(outcome) => {
                    return Ok(self.envelopes.success(
                        outcome,
                        prepared.auth.as_ref(),
                        Some(hit.status()),
                    ));
                }
                Err(e) => warn!(cache_key = %key, error = %e, "unreadable cache entry, executing"),
            }
        }

        let outcome = self.executor.execute(&prepared.sql, &options).await?;
        match serde_json::to_vec(&outcome) {
            Ok(payload) => self.cache.store(&key, payload, request.lifetime).await,
            Err(e) => warn!(cache_key = %key, error = %e, "result not cacheable"),
        }
        Ok(self.envelopes.success(
            outcome,
            prepared.auth.as_ref(),
            Some(CacheStatus::miss()),
        ))
    }

    /// Newline-separated statements in one transaction. The first failure
    /// rolls back everything and is returned; later statements never run.
    /// The cache is neither read nor written.
    pub async fn run_bulk(
        &self,
        batch: &str,
        template: &QueryRequest,
        account: &AccountContext,
    ) -> ResponseEnvelope {
        let batch_id = Uuid::new_v4();
        match self.try_bulk(batch, template, account, batch_id).await {
            Ok(envelope) => envelope,
            Err(err) => {
                info!(%batch_id, code = err.code(), error = %err, "batch rolled back");
                self.envelopes.failure(&err)
            }
        }
    }

    async fn try_bulk(
        &self,
        batch: &str,
        template: &QueryRequest,
        account: &AccountContext,
        batch_id: Uuid,
    ) -> Result<ResponseEnvelope, GateError> {
        let mut tx = self.executor.begin().await?;
        let mut last: Option<(Prepared, ExecOutcome)> = None;
        let mut executed = 0usize;

        for (line_no, line) in batch.lines().enumerate() {
            let sql = line.trim();
            if sql.is_empty() {
                continue;
            }
            let request = template.for_statement(sql);
            match self.bulk_step(tx.as_mut(), &request, account).await {
                Ok(step) => {
                    executed += 1;
                    last = Some(step);
                }
                Err(err) => {
                    debug!(%batch_id, line = line_no + 1, "batch statement failed");
                    rollback(tx).await;
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        info!(%batch_id, account = %account.name, statements = executed, "batch committed");

        let mut envelope = match last {
            Some((prepared, outcome)) => {
                self.envelopes
                    .success(outcome, prepared.auth.as_ref(), None)
            }
            None => self.envelopes.success(ExecOutcome::default(), None, None),
        };
        envelope
            .extra
            .insert("statements".to_string(), executed.into());
        Ok(envelope)
    }

    async fn bulk_step(
        &self,
        tx: &mut dyn Transaction,
        request: &QueryRequest,
        account: &AccountContext,
    ) -> Result<(Prepared, ExecOutcome), GateError> {
        let prepared = self.gatekeeper.prepare(request, account).await?;
        let kind = if prepared.operation.is_mutation() {
            ExecKind::Mutation
        } else {
            ExecKind::Query
        };
        let options = ExecOptions::from_request(request, kind);
        let outcome = tx.execute(&prepared.sql, &options).await?;
        Ok((prepared, outcome))
    }

    /// Validate and authorize, then stream the rows of a read. Writes run in
    /// single mode. Never touches the cache.
    pub async fn open_stream(
        &self,
        request: &QueryRequest,
        account: &AccountContext,
    ) -> StreamOutcome {
        let prepared = match self.gatekeeper.prepare(request, account).await {
            Ok(prepared) => prepared,
            Err(err) => return StreamOutcome::Envelope(self.envelopes.failure(&err)),
        };

        if prepared.operation != Operation::Read {
            debug!(account = %account.name, "stream requested for a write, running in single mode");
            let result = self.execute_prepared(request, &prepared, account).await;
            return StreamOutcome::Envelope(self.settle(result, account));
        }

        info!(account = %account.name, relations = prepared.relations.len(), "streaming read");
        let options = ExecOptions::from_request(request, ExecKind::Query);
        StreamOutcome::Rows(self.streamer.stream(prepared.sql, options))
    }
}

async fn rollback(tx: Box<dyn Transaction>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed");
    }
}
