//! Route definitions for line snapshot and polling control endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{line, polling};
use crate::state::AppState;

/// Routes mounted under `/api`.
///
/// ```text
/// GET  /config             -> get_configuration
/// GET  /live               -> get_live_data
/// GET  /process/{name}     -> get_process_data
/// GET  /equipment/{id}     -> get_equipment_status
/// GET  /stats              -> get_system_stats
/// POST /refresh            -> refresh
/// GET  /polling            -> get_polling_state
/// POST /polling/start      -> start_polling
/// POST /polling/stop       -> stop_polling
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(line::get_configuration))
        .route("/live", get(line::get_live_data))
        .route("/process/{name}", get(line::get_process_data))
        .route("/equipment/{id}", get(line::get_equipment_status))
        .route("/stats", get(line::get_system_stats))
        .route("/refresh", post(line::refresh))
        .route("/polling", get(polling::get_polling_state))
        .route("/polling/start", post(polling::start_polling))
        .route("/polling/stop", post(polling::stop_polling))
}
