//! Request handlers.

use crate::params::{Params, split_user};
use crate::state::AppState;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use sqlgate_core::envelope::ResponseEnvelope;
use sqlgate_runtime::{AccountContext, GateError, RowStream, StreamOutcome};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};

const NDJSON: &str = "application/x-ndjson";

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "sqlgate" }))
}

/// `/api/v2/sql/{user}`: single statement, or a bulk batch when a POST
/// carries `text/plain`.
pub async fn sql(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::POST && content_type(&headers).as_deref() == Some("text/plain") {
        return bulk(&state, &user, query.as_deref(), &headers, &body).await;
    }
    let params = collect_params(query.as_deref(), &headers, &body);
    let stream = params.wants_stream();
    statement(&state, &user, &params, &headers, stream).await
}

/// `/api/v2/sql/{user}/stream`
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = collect_params(query.as_deref(), &headers, &body);
    statement(&state, &user, &params, &headers, true).await
}

async fn statement(
    state: &Arc<AppState>,
    user: &str,
    params: &Params,
    headers: &HeaderMap,
    stream: bool,
) -> Response {
    let (subuser, account_name) = split_user(user);
    let api_key = params
        .get("key")
        .map(str::to_string)
        .or_else(|| header_key(state, headers));

    let mut request = match params.request(subuser, api_key) {
        Ok(request) => request,
        Err(err) => return failure(state, &err),
    };
    let account = match AccountContext::resolve(state.directory.as_ref(), &account_name) {
        Ok(account) => account,
        Err(err) => return failure(state, &err),
    };

    if !stream {
        let envelope = state.coordinator.run_single(&request, &account).await;
        return envelope_response(envelope);
    }

    request.stream = true;
    match state.coordinator.open_stream(&request, &account).await {
        StreamOutcome::Envelope(envelope) => envelope_response(envelope),
        StreamOutcome::Rows(rows) => ndjson(Arc::clone(state), rows),
    }
}

async fn bulk(
    state: &Arc<AppState>,
    user: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let (subuser, account_name) = split_user(user);
    let params = Params::from_query(query);
    let api_key = header_key(state, headers).or_else(|| params.get("key").map(str::to_string));

    let template = match params.template(subuser, api_key) {
        Ok(template) => template,
        Err(err) => return failure(state, &err),
    };
    let account = match AccountContext::resolve(state.directory.as_ref(), &account_name) {
        Ok(account) => account,
        Err(err) => return failure(state, &err),
    };

    let batch = String::from_utf8_lossy(body);
    debug!(account = %account.name, bytes = body.len(), "bulk request");
    let envelope = state.coordinator.run_bulk(&batch, &template, &account).await;
    envelope_response(envelope)
}

fn collect_params(query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Params {
    let mut params = Params::from_query(query);
    if body.is_empty() {
        return params;
    }
    if content_type(headers).as_deref() == Some("application/x-www-form-urlencoded") {
        params.merge_form(body);
    } else if let Ok(json) = serde_json::from_slice::<Value>(body) {
        params.merge_json(&json);
    }
    params
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or(value).trim();
    Some(essence.to_ascii_lowercase())
}

fn header_key(state: &AppState, headers: &HeaderMap) -> Option<String> {
    headers
        .get(&state.api_key_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn failure(state: &AppState, err: &GateError) -> Response {
    info!(code = err.code(), error = %err, "request rejected");
    envelope_response(state.coordinator.failure(err))
}

/// JSON body with the status mirroring the envelope code.
pub fn envelope_response(envelope: ResponseEnvelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

/// One JSON document per line. A failure mid-stream is reported as a final
/// failure envelope line.
fn ndjson(state: Arc<AppState>, mut rows: RowStream) -> Response {
    let lines = async_stream::stream! {
        let mut emitted = 0u64;
        while let Some(row) = rows.next().await {
            match row {
                Ok(value) => {
                    emitted += 1;
                    yield Ok::<_, Infallible>(line(&value));
                }
                Err(e) => {
                    let envelope = state.coordinator.failure(&GateError::from(e));
                    yield Ok(line(&envelope));
                    break;
                }
            }
        }
        debug!(emitted, "stream closed");
    };

    let mut response = Body::from_stream(lines).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(NDJSON));
    response
}

fn line<T: Serialize>(value: &T) -> Bytes {
    let mut buf = serde_json::to_vec(value).unwrap_or_default();
    buf.push(b'\n');
    Bytes::from(buf)
}
