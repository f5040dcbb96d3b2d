//! Cycle-time reconstruction from equipment event batches.
//!
//! Two strategies exist because stations log differently:
//!
//! - [`CycleStrategy::Paired`]: the station logs a request when a unit enters
//!   and a completion when it leaves; the cycle time is the dwell between the
//!   two events for the same serial.
//! - [`CycleStrategy::Continuous`]: the station only logs completions; the
//!   cycle time is the gap between consecutive completions.
//!
//! Both are pure. The pending-request map of the paired strategy lives only
//! for the duration of one [`CycleStrategy::reconstruct`] call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::{EventRecord, EventStatus};
use crate::types::EventTime;

/// Paired observations must be strictly greater than this many seconds.
pub const PAIRED_MIN_EXCLUSIVE_SECS: f64 = 0.0;
/// Paired observations must be strictly below this many seconds (2 hours).
pub const PAIRED_MAX_EXCLUSIVE_SECS: f64 = 7200.0;
/// Continuous observations must be at least this many seconds.
pub const CONTINUOUS_MIN_SECS: f64 = 5.0;
/// Continuous observations must be at most this many seconds.
pub const CONTINUOUS_MAX_SECS: f64 = 300.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Elapsed time for one unit at one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeObservation {
    pub unit_serial: String,
    pub seconds: f64,
    pub started_at: EventTime,
    pub completed_at: EventTime,
    pub equipment_id: String,
}

/// Count of finished units. `total` always equals `ok + ng`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PieceTally {
    pub total: u64,
    pub ok: u64,
    pub ng: u64,
}

impl PieceTally {
    /// Count one completion event. Requests are ignored.
    pub fn record(&mut self, status: EventStatus) {
        match status {
            EventStatus::CompleteOk => self.ok += 1,
            EventStatus::CompleteNg => self.ng += 1,
            EventStatus::Request => return,
        }
        self.total += 1;
    }

    pub fn merge(&mut self, other: &PieceTally) {
        self.total += other.total;
        self.ok += other.ok;
        self.ng += other.ng;
    }
}

impl std::iter::Sum for PieceTally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, t| {
            acc.merge(&t);
            acc
        })
    }
}

/// Result of one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconstruction {
    pub observations: Vec<CycleTimeObservation>,
    pub pieces: PieceTally,
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Reconstruction strategy, chosen per equipment class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStrategy {
    /// Request/completion pairs matched by serial.
    #[default]
    Paired,
    /// Completion-only stream; inter-arrival time approximates cycle time.
    Continuous,
}

impl CycleStrategy {
    /// Whether `seconds` lies inside this strategy's plausibility window.
    pub fn accepts(self, seconds: f64) -> bool {
        match self {
            Self::Paired => {
                seconds > PAIRED_MIN_EXCLUSIVE_SECS && seconds < PAIRED_MAX_EXCLUSIVE_SECS
            }
            Self::Continuous => (CONTINUOUS_MIN_SECS..=CONTINUOUS_MAX_SECS).contains(&seconds),
        }
    }

    /// Turn one equipment's batch into observations and a piece tally.
    ///
    /// The batch may arrive in any order; it is walked chronologically.
    /// Records with equal timestamps keep their relative input order.
    pub fn reconstruct(self, batch: &[EventRecord], equipment_id: &str) -> Reconstruction {
        let mut ordered: Vec<&EventRecord> = batch.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        match self {
            Self::Paired => reconstruct_paired(&ordered, equipment_id),
            Self::Continuous => reconstruct_continuous(&ordered, equipment_id),
        }
    }
}

fn elapsed_secs(from: EventTime, to: EventTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

fn reconstruct_paired(ordered: &[&EventRecord], equipment_id: &str) -> Reconstruction {
    let mut pending: HashMap<&str, &EventRecord> = HashMap::new();
    let mut out = Reconstruction::default();

    for &record in ordered {
        match record.status {
            EventStatus::Request => {
                pending.insert(record.serial.as_str(), record);
            }
            EventStatus::CompleteOk | EventStatus::CompleteNg => {
                out.pieces.record(record.status);

                let Some(request) = pending.remove(record.serial.as_str()) else {
                    continue;
                };
                let seconds = elapsed_secs(request.timestamp, record.timestamp);
                if CycleStrategy::Paired.accepts(seconds) {
                    out.observations.push(CycleTimeObservation {
                        unit_serial: record.serial.clone(),
                        seconds,
                        started_at: request.timestamp,
                        completed_at: record.timestamp,
                        equipment_id: equipment_id.to_string(),
                    });
                } else {
                    tracing::trace!(
                        equipment_id,
                        serial = %record.serial,
                        seconds,
                        "Paired cycle time outside plausibility window"
                    );
                }
            }
        }
    }

    out
}

fn reconstruct_continuous(ordered: &[&EventRecord], equipment_id: &str) -> Reconstruction {
    let mut out = Reconstruction::default();
    let mut previous: Option<&EventRecord> = None;

    for record in ordered.iter().copied().filter(|r| r.status.is_completion()) {
        out.pieces.record(record.status);

        if let Some(prev) = previous {
            let seconds = elapsed_secs(prev.timestamp, record.timestamp);
            if CycleStrategy::Continuous.accepts(seconds) {
                out.observations.push(CycleTimeObservation {
                    unit_serial: record.serial.clone(),
                    seconds,
                    started_at: prev.timestamp,
                    completed_at: record.timestamp,
                    equipment_id: equipment_id.to_string(),
                });
            }
        }
        previous = Some(record);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
