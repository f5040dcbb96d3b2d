use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the scheduler is currently polling.
    pub polling: bool,
    /// Equipment whose last fetch failed; `0` before the first tick.
    pub equipment_failed: usize,
}

/// GET /health -- returns service and polling health.
///
/// Reports `degraded` when every configured equipment failed on the last tick.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let total = state.poller.configuration().equipment.len();
    let equipment_failed = state
        .poller
        .live_data()
        .map(|snapshot| snapshot.failed_equipment())
        .unwrap_or(0);

    let status = if total > 0 && equipment_failed == total {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        polling: state.poller.is_polling(),
        equipment_failed,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
