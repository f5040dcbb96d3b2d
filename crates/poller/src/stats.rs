//! Lifecycle state and runtime statistics reported by the scheduler.

use linewatch_core::types::Timestamp;
use serde::Serialize;

/// Result of a start/stop request and of [`Poller::state`](crate::Poller::state).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingState {
    pub polling: bool,
    pub started_at: Option<Timestamp>,
    pub poll_interval_secs: u64,
    /// Tick number of the last published snapshot.
    pub last_tick: Option<u64>,
}

/// Counters maintained across ticks.
#[derive(Debug, Clone, Default)]
pub(crate) struct TickStats {
    pub ticks_completed: u64,
    pub ticks_discarded: u64,
    pub ticks_skipped: u64,
    pub last_tick_at: Option<Timestamp>,
    pub last_tick_duration_ms: Option<u64>,
    pub equipment_failed_last_tick: usize,
}

/// Operational overview of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    pub polling: bool,
    pub started_at: Option<Timestamp>,
    pub ticks_completed: u64,
    pub ticks_discarded: u64,
    pub ticks_skipped: u64,
    pub last_tick_at: Option<Timestamp>,
    pub last_tick_duration_ms: Option<u64>,
    pub equipment_total: usize,
    pub equipment_failed_last_tick: usize,
    pub subscribers: usize,
    pub poll_interval_secs: u64,
}
