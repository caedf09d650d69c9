//! Route definitions.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/v2/sql/{user}", get(handlers::sql).post(handlers::sql))
        .route(
            "/api/v2/sql/{user}/stream",
            get(handlers::stream).post(handlers::stream),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}
