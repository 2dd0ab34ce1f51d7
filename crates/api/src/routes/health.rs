use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use toolz_worker::DispatcherStats;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs registered but not yet finished.
    pub jobs_pending: usize,
    pub dispatcher: DispatcherStats,
}

/// GET /health -- returns service status and background work counters.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.dispatcher.is_closed() {
        "shutting_down"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        jobs_pending: state.registry.len(),
        dispatcher: state.dispatcher.stats(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
