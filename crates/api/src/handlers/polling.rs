//! Handlers that start and stop the polling scheduler.

use axum::extract::State;
use axum::Json;
use linewatch_poller::PollingState;

use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/polling/start
///
/// Idempotent: a second start reports the running state without adding a timer.
pub async fn start_polling(State(state): State<AppState>) -> Json<ApiResponse<PollingState>> {
    Json(ApiResponse::ok(state.poller.start().await))
}

/// POST /api/polling/stop
///
/// Connected WebSocket clients receive a Close frame once their
/// subscriptions are dropped.
pub async fn stop_polling(State(state): State<AppState>) -> Json<ApiResponse<PollingState>> {
    Json(ApiResponse::ok(state.poller.stop().await))
}

/// GET /api/polling
pub async fn get_polling_state(State(state): State<AppState>) -> Json<ApiResponse<PollingState>> {
    Json(ApiResponse::ok(state.poller.state()))
}
