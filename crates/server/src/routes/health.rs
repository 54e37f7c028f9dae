//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// Outbox records not yet delivered; absent when the journal is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_outbox_records: Option<u64>,

    pub poller_running: bool,
}

/// GET /health — reports journal reachability and the outbox backlog.
pub async fn check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let poller_running = state.poller_running();
    match state.journal.pending_count().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                pending_outbox_records: Some(pending),
                poller_running,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the outbox journal");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    pending_outbox_records: None,
                    poller_running,
                }),
            )
        }
    }
}
