//! Axum adapter for the control API.
//!
//! Four routes, JSON in and out. Handlers take the engine mutex briefly;
//! one-shot executions therefore serialise with the scheduler loop. The
//! server drains on the shared stop flag so Ctrl-C brings both the loop and
//! the HTTP surface down together.

use super::{SharedEngine, api};
use crate::error::{Error, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Build the control-plane router.
pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/script/programs/{id}/validate", post(validate_script))
        .route("/script/programs/{id}/execute", post(execute_script))
        .route("/fbd/programs/{id}/execute", post(execute_fbd))
        .route("/fbd/programs/{id}/runtime", get(fbd_runtime))
        .with_state(engine)
}

/// Bind and serve until `stop` is raised.
pub async fn serve(
    engine: SharedEngine,
    addr: &str,
    stop: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("control surface listening on {addr}");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(async move {
            while !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
        .await
}

// ── Handlers ──────────────────────────────────────────────────

async fn validate_script(State(engine): State<SharedEngine>, Path(id): Path<i64>) -> Response {
    respond(api::validate_script(&engine, id))
}

async fn execute_script(State(engine): State<SharedEngine>, Path(id): Path<i64>) -> Response {
    respond(api::execute_script(&engine, id))
}

async fn execute_fbd(State(engine): State<SharedEngine>, Path(id): Path<i64>) -> Response {
    respond(api::execute_fbd(&engine, id))
}

async fn fbd_runtime(State(engine): State<SharedEngine>, Path(id): Path<i64>) -> Response {
    respond(api::fbd_runtime(&engine, id))
}

fn respond(result: crate::error::Result<serde_json::Value>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(Error::Store(StoreError::NotFound(kind, id))) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "error": format!("{kind} {id} not found") })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": e.to_string() })),
        )
            .into_response(),
    }
}
