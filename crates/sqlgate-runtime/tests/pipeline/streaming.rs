//! Streaming mode.

use super::common::*;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlgate_core::QueryRequest;
use sqlgate_runtime::{ExecKind, StreamOutcome};

#[tokio::test]
async fn test_read_streams_rows() {
    let harness = Harness::new();
    let request = QueryRequest::new("SELECT * FROM public.parcels").streaming();

    let outcome = harness
        .coordinator
        .open_stream(&request, &account(RecordingAuthorizer::allowing()))
        .await;

    let StreamOutcome::Rows(rows) = outcome else {
        panic!("expected a row stream");
    };
    let rows: Vec<_> = rows.map(|row| row.unwrap()).collect().await;
    assert_eq!(rows, vec![json!({ "id": 1 }), json!({ "id": 2 })]);
    assert_eq!(
        *harness.streamer.streamed.lock().unwrap(),
        vec!["SELECT * FROM public.parcels".to_string()]
    );
    assert!(harness.executor.events().is_empty());
}

#[tokio::test]
async fn test_write_falls_back_to_single_mode() {
    let harness = Harness::new();
    let request = QueryRequest::new("DELETE FROM public.parcels WHERE id = 1").streaming();
    let authorizer = RecordingAuthorizer::allowing();

    let outcome = harness
        .coordinator
        .open_stream(&request, &account(authorizer.clone()))
        .await;

    let StreamOutcome::Envelope(envelope) = outcome else {
        panic!("expected an envelope");
    };
    assert!(envelope.success);
    assert_eq!(envelope.affected_rows, Some(1));
    assert!(harness.streamer.streamed.lock().unwrap().is_empty());
    assert_eq!(
        harness.executor.events(),
        vec![Event::Execute {
            sql: "DELETE FROM public.parcels WHERE id = 1".to_string(),
            kind: ExecKind::Mutation,
        }]
    );
    // authorized once, not again on the single-mode fallback
    assert_eq!(
        authorizer.calls(),
        vec![AuthCall {
            relation: "public.parcels".to_string(),
            require_write: true,
            known_relations: vec!["public.parcels".to_string()],
        }]
    );
}

#[tokio::test]
async fn test_rejected_stream_returns_envelope() {
    let harness = Harness::new();
    let request = QueryRequest::new("SELECT * FROM public.parcels").streaming();

    let outcome = harness
        .coordinator
        .open_stream(
            &request,
            &account(RecordingAuthorizer::denying(&["public.parcels"])),
        )
        .await;

    let StreamOutcome::Envelope(envelope) = outcome else {
        panic!("expected an envelope");
    };
    assert_eq!(envelope.code, Some(403));
    assert!(harness.streamer.streamed.lock().unwrap().is_empty());
}
