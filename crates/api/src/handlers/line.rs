//! Handlers for line configuration and snapshot queries.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use linewatch_core::aggregate::ProcessSnapshot;
use linewatch_core::snapshot::EquipmentStatus;
use linewatch_core::{LineConfig, LineSnapshot};
use linewatch_poller::{PollerError, SystemStats};

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/config
///
/// Static line configuration (equipment endpoints and process topology).
pub async fn get_configuration(
    State(state): State<AppState>,
) -> Json<ApiResponse<Arc<LineConfig>>> {
    Json(ApiResponse::ok(Arc::clone(state.poller.configuration())))
}

/// GET /api/live
///
/// Last published line snapshot. 503 until the first tick has completed.
pub async fn get_live_data(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Arc<LineSnapshot>>>> {
    let snapshot = state.poller.live_data().ok_or(PollerError::NoData)?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// GET /api/process/{name}
pub async fn get_process_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<ApiResponse<ProcessSnapshot>>> {
    let process = state.poller.process_data(&name)?;
    Ok(Json(ApiResponse::ok(process)))
}

/// GET /api/equipment/{id}
///
/// Fetch outcome of one equipment on the last published tick.
pub async fn get_equipment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<EquipmentStatus>>> {
    let status = state.poller.equipment_status(&id)?;
    Ok(Json(ApiResponse::ok(status)))
}

/// GET /api/stats
pub async fn get_system_stats(State(state): State<AppState>) -> Json<ApiResponse<SystemStats>> {
    Json(ApiResponse::ok(state.poller.system_stats()))
}

/// POST /api/refresh
///
/// Run one tick immediately and return its snapshot.
pub async fn refresh(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Arc<LineSnapshot>>>> {
    let snapshot = state.poller.refresh().await?;
    tracing::info!(tick = snapshot.tick, "Manual refresh completed");
    Ok(Json(ApiResponse::ok(snapshot)))
}
