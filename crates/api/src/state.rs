use std::sync::Arc;

use linewatch_poller::Poller;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Polling scheduler; also owns the line configuration and snapshot hub.
    pub poller: Poller,
    /// WebSocket connection manager (dashboard clients).
    pub ws_manager: Arc<WsManager>,
}
