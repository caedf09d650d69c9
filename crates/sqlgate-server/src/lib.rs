//! # sqlgate-server
//!
//! HTTP surface of the gateway.
//!
//! | Route | Mode |
//! |-------|------|
//! | `GET\|POST /api/v2/sql/{user}` | single statement, or bulk for `text/plain` POST bodies |
//! | `GET\|POST /api/v2/sql/{user}/stream` | streamed rows as NDJSON |
//! | `GET /healthz` | liveness |
//!
//! `{user}` is an account name, optionally prefixed with `subuser@`.

pub mod handlers;
pub mod params;
pub mod routes;
pub mod server;
pub mod state;

pub use params::Params;
pub use routes::create_router;
pub use server::{serve, spawn_purge_task};
pub use state::AppState;
