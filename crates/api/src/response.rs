//! Shared response envelope for API handlers.
//!
//! Successful responses are `{ "success": true, "data": ..., "timestamp": ... }`.
//! Errors use the same shape with `success: false` (see [`crate::error`]).

use linewatch_core::types::Timestamp;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub timestamp: Timestamp,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now(),
        }
    }
}
