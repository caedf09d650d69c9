//! Shared fakes for the coordinator tests.
//!
//! - `RecordingAuthorizer`: records every question, denies a configured set
//! - `FakeExecutor` / `FakeTransaction`: record every call in one event log
//! - `FakeStreamer`: yields canned rows
//! - `TestClock`: a clock moved by hand

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream;
use serde_json::{Value, json};
use sqlgate_auth::{AuthRequest, AuthResult, Authorizer};
use sqlgate_cache::{Clock, MemoryStore, ResultCache, ResultStore};
use sqlgate_runtime::{
    AccountContext, Coordinator, EnvelopeBuilder, ExecError, ExecKind, ExecOptions, ExecOutcome,
    Gatekeeper, RowStream, RowStreamer, SqlExecutor, Transaction,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: &str = "mapcentia";
pub const ACCOUNT_KEY: &str = "owner-key";

// =============================================================================
// AUTHORIZER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCall {
    pub relation: String,
    pub require_write: bool,
    pub known_relations: Vec<String>,
}

#[derive(Default)]
pub struct RecordingAuthorizer {
    deny: HashSet<String>,
    calls: Mutex<Vec<AuthCall>>,
}

impl RecordingAuthorizer {
    pub fn allowing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn denying(relations: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            deny: relations.iter().map(|r| r.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<AuthCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorizer for RecordingAuthorizer {
    async fn authorize(&self, request: &AuthRequest<'_>) -> AuthResult {
        self.calls.lock().unwrap().push(AuthCall {
            relation: request.relation.to_string(),
            require_write: request.require_write,
            known_relations: request.known_relations.to_vec(),
        });
        if self.deny.contains(request.relation) {
            AuthResult::denied(403, format!("Forbidden relation {}", request.relation))
                .with_detail("auth_level", "none")
        } else {
            AuthResult::granted().with_detail("auth_level", "key")
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Execute { sql: String, kind: ExecKind },
    Begin,
    TxExecute { sql: String, kind: ExecKind },
    Commit,
    Rollback,
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<Event>>,
    counter: Mutex<u64>,
}

impl Shared {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn outcome(
        &self,
        sql: &str,
        kind: ExecKind,
        fail_on: Option<&str>,
    ) -> Result<ExecOutcome, ExecError> {
        if let Some(pattern) = fail_on.filter(|p| sql.contains(p)) {
            return Err(ExecError::Statement(format!(
                "relation \"{}\" does not exist",
                pattern
            )));
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        Ok(match kind {
            ExecKind::Query => ExecOutcome::rows(json!([{ "run": *counter }])),
            ExecKind::Mutation => ExecOutcome::affected(1),
        })
    }
}

/// Executor whose statements fail when their text contains `fail_on`.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    shared: Arc<Shared>,
    fail_on: Option<String>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.lock().unwrap().clone()
    }

    /// Statements that reached the database, in or out of a transaction.
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute { sql, .. } | Event::TxExecute { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SqlExecutor for FakeExecutor {
    async fn execute(&self, sql: &str, options: &ExecOptions) -> Result<ExecOutcome, ExecError> {
        self.shared.record(Event::Execute {
            sql: sql.to_string(),
            kind: options.kind,
        });
        self.shared.outcome(sql, options.kind, self.fail_on.as_deref())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, ExecError> {
        self.shared.record(Event::Begin);
        Ok(Box::new(FakeTransaction {
            shared: Arc::clone(&self.shared),
            fail_on: self.fail_on.clone(),
        }))
    }
}

pub struct FakeTransaction {
    shared: Arc<Shared>,
    fail_on: Option<String>,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(
        &mut self,
        sql: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutcome, ExecError> {
        self.shared.record(Event::TxExecute {
            sql: sql.to_string(),
            kind: options.kind,
        });
        self.shared.outcome(sql, options.kind, self.fail_on.as_deref())
    }

    async fn commit(self: Box<Self>) -> Result<(), ExecError> {
        self.shared.record(Event::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ExecError> {
        self.shared.record(Event::Rollback);
        Ok(())
    }
}

// =============================================================================
// STREAMER
// =============================================================================

#[derive(Default)]
pub struct FakeStreamer {
    pub streamed: Mutex<Vec<String>>,
}

impl RowStreamer for FakeStreamer {
    fn stream(&self, sql: String, _options: ExecOptions) -> RowStream {
        self.streamed.lock().unwrap().push(sql);
        let rows: Vec<Result<Value, ExecError>> =
            vec![Ok(json!({ "id": 1 })), Ok(json!({ "id": 2 }))];
        Box::pin(stream::iter(rows))
    }
}

// =============================================================================
// CLOCK
// =============================================================================

pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += TimeDelta::from_std(by).unwrap();
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct Harness {
    pub coordinator: Coordinator,
    pub executor: FakeExecutor,
    pub streamer: Arc<FakeStreamer>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<TestClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_executor(FakeExecutor::new())
    }

    pub fn with_executor(executor: FakeExecutor) -> Self {
        let clock = TestClock::new();
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let cache = ResultCache::new(store.clone(), Duration::from_secs(3600));
        Self::assemble(executor, store, clock, cache)
    }

    pub fn with_store(executor: FakeExecutor, store: Arc<dyn ResultStore>) -> Self {
        let clock = TestClock::new();
        let cache = ResultCache::new(store, Duration::from_secs(3600));
        let unused = Arc::new(MemoryStore::with_clock(clock.clone()));
        Self::assemble(executor, unused, clock, cache)
    }

    fn assemble(
        executor: FakeExecutor,
        store: Arc<MemoryStore>,
        clock: Arc<TestClock>,
        cache: ResultCache,
    ) -> Self {
        let streamer = Arc::new(FakeStreamer::default());
        let coordinator = Coordinator::new(
            Gatekeeper::default(),
            Arc::new(executor.clone()),
            streamer.clone(),
            cache,
        )
        .with_envelopes(EnvelopeBuilder::without_memory());
        Self {
            coordinator,
            executor,
            streamer,
            store,
            clock,
        }
    }
}

pub fn account(authorizer: Arc<RecordingAuthorizer>) -> AccountContext {
    AccountContext::new(ACCOUNT, Some(ACCOUNT_KEY.to_string()), authorizer)
}
