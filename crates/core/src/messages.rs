//! Push-channel message types.
//!
//! Every frame sent to a subscriber is a JSON object
//! `{ "type": <discriminator>, "data": <payload>, "timestamp": <rfc3339> }`.

use serde::Serialize;

use crate::types::Timestamp;

/// Sent once, right after a client connects, carrying the last known snapshot.
pub const MSG_TYPE_INITIAL_DATA: &str = "initial_data";

/// Sent for every snapshot published while the client is connected.
pub const MSG_TYPE_DATA_UPDATE: &str = "data_update";

/// Envelope for one push-channel frame.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub data: &'a T,
    pub timestamp: Timestamp,
}

impl<'a, T: Serialize> PushMessage<'a, T> {
    pub fn initial(data: &'a T) -> Self {
        Self {
            message_type: MSG_TYPE_INITIAL_DATA,
            data,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn update(data: &'a T) -> Self {
        Self {
            message_type: MSG_TYPE_DATA_UPDATE,
            data,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
