//! Single statement mode.

use super::common::*;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlgate_cache::{CacheEntry, CacheError, CacheKey, ResultStore};
use sqlgate_core::QueryRequest;
use sqlgate_runtime::ExecKind;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// READS
// =============================================================================

#[tokio::test]
async fn test_read_is_authorized_then_executed() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();
    let request = QueryRequest::new("SELECT * FROM public.parcels WHERE id=1");

    let envelope = harness
        .coordinator
        .run_single(&request, &account(authorizer.clone()))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!([{ "run": 1 }])));
    assert_eq!(envelope.cache_hit, None);
    assert_eq!(
        envelope.auth_check.unwrap().get("auth_level"),
        Some(&json!("key"))
    );
    assert_eq!(
        authorizer.calls(),
        vec![AuthCall {
            relation: "public.parcels".to_string(),
            require_write: false,
            known_relations: vec!["public.parcels".to_string()],
        }]
    );
    assert_eq!(
        harness.executor.events(),
        vec![Event::Execute {
            sql: "SELECT * FROM public.parcels WHERE id=1".to_string(),
            kind: ExecKind::Query,
        }]
    );
}

#[tokio::test]
async fn test_statement_without_relations_skips_authorizer() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();

    let envelope = harness
        .coordinator
        .run_single(&QueryRequest::new("SELECT 1"), &account(authorizer.clone()))
        .await;

    assert!(envelope.success);
    assert!(authorizer.calls().is_empty());
    assert_eq!(envelope.auth_check, None);
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[tokio::test]
async fn test_semicolon_rejected_before_anything_runs() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("SELECT 1; SELECT 2"),
            &account(authorizer.clone()),
        )
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(403));
    assert_eq!(
        envelope.message.as_deref(),
        Some("You can't use ';'. Use the bulk transaction API instead")
    );
    assert!(authorizer.calls().is_empty());
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_drop_rejected_without_authorization() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("DROP TABLE public.parcels"),
            &account(authorizer.clone()),
        )
        .await;

    assert_eq!(envelope.code, Some(403));
    assert_eq!(
        envelope.message.as_deref(),
        Some("DROP is not allowed through the API")
    );
    assert!(authorizer.calls().is_empty());
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_forbidden_relation_codes_by_role() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();
    let account = account(authorizer.clone());

    let read = harness
        .coordinator
        .run_single(&QueryRequest::new("SELECT * FROM settings.keys"), &account)
        .await;
    assert_eq!(read.code, Some(403));
    assert_eq!(read.message.as_deref(), Some("Can't complete the query"));

    let write = harness
        .coordinator
        .run_single(
            &QueryRequest::new("INSERT INTO settings.keys (k) VALUES ('x')"),
            &account,
        )
        .await;
    assert_eq!(write.code, Some(406));

    assert!(authorizer.calls().is_empty());
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_unrecognized_statement() {
    let harness = Harness::new();

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("TRUNCATE public.parcels"),
            &account(RecordingAuthorizer::allowing()),
        )
        .await;

    assert_eq!(envelope.code, Some(400));
    assert_eq!(
        envelope.message.as_deref(),
        Some("Check your SQL. Could not recognise it as either SELECT, INSERT, UPDATE or DELETE")
    );
}

#[tokio::test]
async fn test_database_error_is_reported() {
    let harness = Harness::with_executor(FakeExecutor::failing_on("missing"));

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("SELECT * FROM missing"),
            &account(RecordingAuthorizer::allowing()),
        )
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(400));
    assert_eq!(
        envelope.message.as_deref(),
        Some("relation \"missing\" does not exist")
    );
}

// =============================================================================
// WRITES AND AUTHORIZATION
// =============================================================================

#[tokio::test]
async fn test_write_requires_write_on_every_relation() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new(
                "UPDATE public.parcels SET owner = o.name FROM public.owners o WHERE o.id = parcels.owner_id",
            ),
            &account(authorizer.clone()),
        )
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.affected_rows, Some(1));
    let calls = authorizer.calls();
    assert_eq!(
        calls.iter().map(|c| c.relation.as_str()).collect::<Vec<_>>(),
        vec!["public.parcels", "public.owners"]
    );
    assert!(calls.iter().all(|c| c.require_write));
    assert!(matches!(
        harness.executor.events().as_slice(),
        [Event::Execute {
            kind: ExecKind::Mutation,
            ..
        }]
    ));
}

#[tokio::test]
async fn test_first_denial_short_circuits() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::denying(&["public.a"]);

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("SELECT * FROM public.a JOIN public.b ON a.id = b.id"),
            &account(authorizer.clone()),
        )
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(403));
    assert_eq!(envelope.message.as_deref(), Some("Forbidden relation public.a"));
    let auth_check = envelope.auth_check.unwrap();
    assert_eq!(auth_check.get("success"), Some(&json!(false)));
    assert_eq!(auth_check.get("auth_level"), Some(&json!("none")));
    assert_eq!(authorizer.calls().len(), 1);
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_create_view_needs_account_key() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();
    let account = account(authorizer.clone());
    let sql = "CREATE VIEW public.v AS SELECT * FROM public.parcels";

    let denied = harness
        .coordinator
        .run_single(&QueryRequest::new(sql).with_api_key("guess"), &account)
        .await;
    assert_eq!(denied.code, Some(403));
    assert_eq!(denied.message.as_deref(), Some("Not the right key!"));
    assert!(harness.executor.events().is_empty());

    let created = harness
        .coordinator
        .run_single(&QueryRequest::new(sql).with_api_key(ACCOUNT_KEY), &account)
        .await;
    assert!(created.success);
    assert_eq!(
        harness.executor.events(),
        vec![Event::Execute {
            sql: sql.to_string(),
            kind: ExecKind::Mutation,
        }]
    );
    // embedded relations are authorized for reading
    assert!(authorizer.calls().iter().all(|c| !c.require_write));
}

#[tokio::test]
async fn test_select_into_needs_account_key() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();
    let account = account(authorizer.clone());
    let sql = "SELECT * INTO public.snapshot FROM public.parcels";

    let denied = harness
        .coordinator
        .run_single(&QueryRequest::new(sql), &account)
        .await;
    assert_eq!(denied.code, Some(403));
    assert_eq!(denied.message.as_deref(), Some("Not the right key!"));
    assert!(harness.executor.events().is_empty());

    let created = harness
        .coordinator
        .run_single(&QueryRequest::new(sql).with_api_key(ACCOUNT_KEY), &account)
        .await;
    assert!(created.success);
    assert_eq!(
        harness.executor.events(),
        vec![Event::Execute {
            sql: sql.to_string(),
            kind: ExecKind::Mutation,
        }]
    );
}

#[tokio::test]
async fn test_create_in_forbidden_schema_rejected_with_owner_key() {
    let harness = Harness::new();
    let authorizer = RecordingAuthorizer::allowing();
    let account = account(authorizer.clone());

    for sql in [
        "CREATE TABLE settings.copy AS SELECT * FROM public.parcels",
        "CREATE VIEW public.geometry_columns AS SELECT 1",
    ] {
        let envelope = harness
            .coordinator
            .run_single(&QueryRequest::new(sql).with_api_key(ACCOUNT_KEY), &account)
            .await;
        assert_eq!(envelope.code, Some(406), "{}", sql);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Can't complete the query")
        );
    }
    assert!(authorizer.calls().is_empty());
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_create_index_rejected() {
    let harness = Harness::new();

    let envelope = harness
        .coordinator
        .run_single(
            &QueryRequest::new("CREATE INDEX parcels_idx ON public.parcels (id)")
                .with_api_key(ACCOUNT_KEY),
            &account(RecordingAuthorizer::allowing()),
        )
        .await;

    assert_eq!(envelope.code, Some(403));
    assert_eq!(
        envelope.message.as_deref(),
        Some("Only CREATE VIEW is allowed through the API")
    );
}

// =============================================================================
// CACHING
// =============================================================================

#[tokio::test]
async fn test_cached_read_served_until_expiry() {
    let harness = Harness::new();
    let account = account(RecordingAuthorizer::allowing());
    let request = QueryRequest::new("SELECT * FROM public.parcels")
        .with_lifetime(Duration::from_secs(60));

    let first = harness.coordinator.run_single(&request, &account).await;
    assert_eq!(serde_json::to_value(&first).unwrap()["cache_hit"], json!(false));
    assert_eq!(first.data, Some(json!([{ "run": 1 }])));

    let second = harness.coordinator.run_single(&request, &account).await;
    let status = second.cache_hit.unwrap();
    assert!(status.is_hit());
    assert_eq!(second.data, Some(json!([{ "run": 1 }])));
    assert!(second.auth_check.is_some());
    assert_eq!(harness.executor.executed().len(), 1);

    harness.clock.advance(Duration::from_secs(61));
    let third = harness.coordinator.run_single(&request, &account).await;
    assert!(!third.cache_hit.unwrap().is_hit());
    assert_eq!(third.data, Some(json!([{ "run": 2 }])));
    assert_eq!(harness.executor.executed().len(), 2);
}

#[tokio::test]
async fn test_cached_read_is_still_authorized() {
    let harness = Harness::new();
    let request = QueryRequest::new("SELECT * FROM public.parcels")
        .with_lifetime(Duration::from_secs(60));

    harness
        .coordinator
        .run_single(&request, &account(RecordingAuthorizer::allowing()))
        .await;
    let denied = harness
        .coordinator
        .run_single(
            &request,
            &account(RecordingAuthorizer::denying(&["public.parcels"])),
        )
        .await;

    assert!(!denied.success);
    assert_eq!(denied.data, None);
    assert_eq!(denied.cache_hit, None);
}

#[tokio::test]
async fn test_different_lifetimes_do_not_share_entries() {
    let harness = Harness::new();
    let account = account(RecordingAuthorizer::allowing());
    let sql = "SELECT * FROM public.parcels";

    harness
        .coordinator
        .run_single(
            &QueryRequest::new(sql).with_lifetime(Duration::from_secs(60)),
            &account,
        )
        .await;
    let other = harness
        .coordinator
        .run_single(
            &QueryRequest::new(sql).with_lifetime(Duration::from_secs(120)),
            &account,
        )
        .await;

    assert!(!other.cache_hit.unwrap().is_hit());
    assert_eq!(harness.store.len().await, 2);
}

#[tokio::test]
async fn test_writes_are_never_cached() {
    let harness = Harness::new();
    let account = account(RecordingAuthorizer::allowing());
    let request = QueryRequest::new("DELETE FROM public.parcels WHERE id = 3")
        .with_lifetime(Duration::from_secs(60));

    let first = harness.coordinator.run_single(&request, &account).await;
    let second = harness.coordinator.run_single(&request, &account).await;

    assert_eq!(first.cache_hit, None);
    assert_eq!(second.cache_hit, None);
    assert_eq!(harness.executor.executed().len(), 2);
    assert!(harness.store.is_empty().await);
}

struct UnreachableStore;

#[async_trait]
impl ResultStore for UnreachableStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn put(
        &self,
        _key: &CacheKey,
        _payload: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_unreachable_cache_falls_back_to_execution() {
    let harness = Harness::with_store(FakeExecutor::new(), Arc::new(UnreachableStore));
    let request = QueryRequest::new("SELECT * FROM public.parcels")
        .with_lifetime(Duration::from_secs(60));

    let envelope = harness
        .coordinator
        .run_single(&request, &account(RecordingAuthorizer::allowing()))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!([{ "run": 1 }])));
    assert!(!envelope.cache_hit.unwrap().is_hit());
}
