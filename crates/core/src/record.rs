//! Typed equipment log events.

use serde::Serialize;

use crate::types::EventTime;

/// Status literal for a unit entering a station.
pub const STATUS_REQUEST: &str = "REQUEST";
/// Status literal for a unit leaving a station with a good result.
pub const STATUS_COMPLETE_OK: &str = "COMPLETE_OK";
/// Status literal for a unit leaving a station with a rejected result.
pub const STATUS_COMPLETE_NG: &str = "COMPLETE_NG";

/// Lifecycle marker carried by every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Request,
    CompleteOk,
    CompleteNg,
}

impl EventStatus {
    /// Map a raw status literal to its variant. Matching is exact.
    pub fn from_literal(raw: &str) -> Option<Self> {
        match raw {
            STATUS_REQUEST => Some(Self::Request),
            STATUS_COMPLETE_OK => Some(Self::CompleteOk),
            STATUS_COMPLETE_NG => Some(Self::CompleteNg),
            _ => None,
        }
    }

    pub fn is_completion(self) -> bool {
        matches!(self, Self::CompleteOk | Self::CompleteNg)
    }
}

/// One validated event from an equipment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub serial: String,
    pub line: String,
    pub part_number: String,
    pub process: String,
    pub equipment: String,
    pub status: EventStatus,
    pub timestamp: EventTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_literals_are_exact() {
        assert_eq!(EventStatus::from_literal("REQUEST"), Some(EventStatus::Request));
        assert_eq!(
            EventStatus::from_literal("COMPLETE_OK"),
            Some(EventStatus::CompleteOk)
        );
        assert_eq!(
            EventStatus::from_literal("COMPLETE_NG"),
            Some(EventStatus::CompleteNg)
        );
        assert_eq!(EventStatus::from_literal("request"), None);
        assert_eq!(EventStatus::from_literal("OK"), None);
        assert_eq!(EventStatus::from_literal(""), None);
    }

    #[test]
    fn only_completions_are_completions() {
        assert!(!EventStatus::Request.is_completion());
        assert!(EventStatus::CompleteOk.is_completion());
        assert!(EventStatus::CompleteNg.is_completion());
    }
}
