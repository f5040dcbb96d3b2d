//! WebSocket push channel for dashboard clients.
//!
//! Provides connection management, heartbeat pings, and the HTTP upgrade
//! handler that streams line snapshots to each client.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL_SECS};
pub use manager::WsManager;
