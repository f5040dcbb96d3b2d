//! Line snapshot assembly.
//!
//! Turns one tick's raw fetch results into the published [`LineSnapshot`]:
//! reconstruct per equipment, aggregate per process, summarize the line,
//! then round every published float to one decimal.

use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::{
    aggregate_line, aggregate_process, EquipmentBreakdown, EquipmentMetrics, LineSummary,
    ProcessMetrics, ProcessSnapshot,
};
use crate::config::LineConfig;
use crate::record::EventRecord;
use crate::types::{EventTime, Timestamp};

/// Outcome of fetching one equipment's log this tick. The error side carries
/// a human-readable description of the last failure.
pub type FetchResult<'a> = Result<&'a [EventRecord], String>;

/// Error reported for configured equipment with no fetch result at all.
pub const NOT_FETCHED: &str = "equipment was not fetched";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    Ok,
    Error,
}

/// Per-equipment fetch outcome for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentStatus {
    pub equipment_id: String,
    pub display_name: String,
    pub state: FetchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub record_count: usize,
    /// Newest event timestamp in the batch (equipment local time).
    pub last_event_at: Option<EventTime>,
}

/// One consistent, line-wide result of a polling tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSnapshot {
    /// Monotonic tick number; later ticks always carry larger numbers.
    pub tick: u64,
    pub line_id: String,
    pub display_name: String,
    pub generated_at: Timestamp,
    pub summary: LineSummary,
    pub processes: Vec<ProcessSnapshot>,
    pub equipment: Vec<EquipmentStatus>,
}

impl LineSnapshot {
    pub fn process(&self, name: &str) -> Option<&ProcessSnapshot> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn equipment_status(&self, id: &str) -> Option<&EquipmentStatus> {
        self.equipment.iter().find(|e| e.equipment_id == id)
    }

    /// Number of equipment whose fetch failed this tick.
    pub fn failed_equipment(&self) -> usize {
        self.equipment
            .iter()
            .filter(|e| e.state == FetchState::Error)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build the snapshot for `tick` from every equipment's fetch result.
///
/// A failed or missing fetch contributes zero observations and an `error`
/// status; processes still aggregate (falling back to their design time).
pub fn build_snapshot(
    tick: u64,
    generated_at: Timestamp,
    config: &LineConfig,
    fetches: &HashMap<String, FetchResult<'_>>,
    k: f64,
) -> LineSnapshot {
    let mut metrics = Vec::with_capacity(config.equipment.len());
    let mut statuses = Vec::with_capacity(config.equipment.len());

    for eq in &config.equipment {
        let result = fetches
            .get(&eq.id)
            .cloned()
            .unwrap_or_else(|| Err(NOT_FETCHED.to_string()));

        match result {
            Ok(records) => {
                metrics.push(EquipmentMetrics::from_records(eq, records, k));
                statuses.push(EquipmentStatus {
                    equipment_id: eq.id.clone(),
                    display_name: eq.display_name.clone(),
                    state: FetchState::Ok,
                    error: None,
                    record_count: records.len(),
                    last_event_at: records.iter().map(|r| r.timestamp).max(),
                });
            }
            Err(error) => {
                metrics.push(EquipmentMetrics::empty(eq.id.clone()));
                statuses.push(EquipmentStatus {
                    equipment_id: eq.id.clone(),
                    display_name: eq.display_name.clone(),
                    state: FetchState::Error,
                    error: Some(error),
                    record_count: 0,
                    last_event_at: None,
                });
            }
        }
    }

    let processes: Vec<ProcessSnapshot> = config
        .processes
        .iter()
        .map(|p| aggregate_process(p, &metrics, k))
        .collect();
    let summary = aggregate_line(&processes);

    LineSnapshot {
        tick,
        line_id: config.line_id.clone(),
        display_name: config.display_name.clone(),
        generated_at,
        summary: round_summary(summary),
        processes: processes.into_iter().map(round_process).collect(),
        equipment: statuses,
    }
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_metrics(m: ProcessMetrics) -> ProcessMetrics {
    ProcessMetrics {
        real_time: round1(m.real_time),
        hourly_average: round1(m.hourly_average),
        oee: round1(m.oee),
        efficiency: round1(m.efficiency),
        outlier_percentage: round1(m.outlier_percentage),
        throughput: round1(m.throughput),
        ..m
    }
}

fn round_breakdown(b: EquipmentBreakdown) -> EquipmentBreakdown {
    EquipmentBreakdown {
        real_time: b.real_time.map(round1),
        outlier_percentage: round1(b.outlier_percentage),
        weight_percent: b.weight_percent.map(round1),
        ..b
    }
}

fn round_process(p: ProcessSnapshot) -> ProcessSnapshot {
    ProcessSnapshot {
        design_time_seconds: round1(p.design_time_seconds),
        metrics: round_metrics(p.metrics),
        equipment: p.equipment.into_iter().map(round_breakdown).collect(),
        ..p
    }
}

fn round_summary(s: LineSummary) -> LineSummary {
    LineSummary {
        total_cycle_time: round1(s.total_cycle_time),
        avg_oee: round1(s.avg_oee),
        avg_efficiency: round1(s.avg_efficiency),
        outlier_percentage: round1(s.outlier_percentage),
        throughput: round1(s.throughput),
        uptime: round1(s.uptime),
        quality_rate: round1(s.quality_rate),
        ..s
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::record::EventStatus;

    fn config() -> LineConfig {
        LineConfig::from_json_str(
            r#"{
                "line_id": "L1",
                "display_name": "Line 1",
                "equipment": [
                    { "id": "p1", "endpoint": "http://p1/log", "display_name": "Press 1" },
                    { "id": "p2", "endpoint": "http://p2/log", "display_name": "Press 2" },
                    { "id": "p3", "endpoint": "http://p3/log", "display_name": "Press 3" },
                    { "id": "w1", "endpoint": "http://w1/log", "display_name": "Welder" }
                ],
                "processes": [
                    { "name": "press", "display_name": "Pressing",
                      "equipment_ids": ["p1", "p2", "p3"], "topology": "PARALLEL",
                      "design_time_seconds": 30.0 },
                    { "name": "weld", "display_name": "Welding",
                      "equipment_ids": ["w1"], "topology": "SEQUENTIAL",
                      "design_time_seconds": 45.0 }
                ]
            }"#,
        )
        .expect("valid config")
    }

    fn record(serial: &str, equipment: &str, status: EventStatus, secs: i64) -> EventRecord {
        EventRecord {
            serial: serial.into(),
            line: "L1".into(),
            part_number: "PN".into(),
            process: "press".into(),
            equipment: equipment.into(),
            status,
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 14)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap()
                + Duration::seconds(secs),
        }
    }

    /// Three paired cycles of `seconds` each on one equipment.
    fn cycles(equipment: &str, seconds: i64) -> Vec<EventRecord> {
        (0..3)
            .flat_map(|i| {
                let serial = format!("{equipment}-{i}");
                let start = i * 100;
                [
                    record(&serial, equipment, EventStatus::Request, start),
                    record(&serial, equipment, EventStatus::CompleteOk, start + seconds),
                ]
            })
            .collect()
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 14, 7, 30, 0).unwrap()
    }

    #[test]
    fn round1_rounds_half_away_from_zero() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.25), 12.3);
        assert_eq!(round1(95.0), 95.0);
    }

    #[test]
    fn two_of_three_parallel_failures_still_produce_snapshot() {
        let config = config();
        let p2 = cycles("p2", 30);
        let w1 = cycles("w1", 45);
        let mut fetches: HashMap<String, FetchResult<'_>> = HashMap::new();
        fetches.insert("p1".into(), Err("timed out".into()));
        fetches.insert("p2".into(), Ok(p2.as_slice()));
        fetches.insert("p3".into(), Err("connection refused".into()));
        fetches.insert("w1".into(), Ok(w1.as_slice()));

        let snapshot = build_snapshot(7, now(), &config, &fetches, 2.0);

        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.failed_equipment(), 2);
        let press = snapshot.process("press").expect("press present");
        assert_eq!(press.metrics.real_time, 30.0);
        assert_eq!(press.metrics.cycle_count, 3);
        assert_eq!(press.metrics.oee, 100.0);
        assert_eq!(press.pieces.total, 3);
        assert_eq!(snapshot.summary.total_pieces, 6);
        assert_eq!(snapshot.summary.total_cycle_time, 75.0);
        assert_eq!(snapshot.summary.throughput, 48.0);

        let p1 = &snapshot.equipment[0];
        assert_eq!(p1.state, FetchState::Error);
        assert_eq!(p1.error.as_deref(), Some("timed out"));
        assert_eq!(snapshot.equipment[1].record_count, 6);
        assert!(snapshot.equipment[1].last_event_at.is_some());
    }

    #[test]
    fn all_failed_falls_back_to_design_times() {
        let config = config();
        let fetches: HashMap<String, FetchResult<'_>> = HashMap::new();
        let snapshot = build_snapshot(1, now(), &config, &fetches, 2.0);

        assert_eq!(snapshot.failed_equipment(), 4);
        assert_eq!(snapshot.equipment[3].error.as_deref(), Some(NOT_FETCHED));
        let weld = snapshot.process("weld").unwrap();
        assert_eq!(weld.metrics.real_time, 45.0);
        assert_eq!(weld.metrics.efficiency, 95.0);
        assert_eq!(weld.metrics.oee, 95.0);
        assert_eq!(snapshot.summary.quality_rate, 100.0);
        assert_eq!(snapshot.summary.uptime, 95.0);
    }

    #[test]
    fn published_floats_are_rounded() {
        let config = config();
        let w1 = cycles("w1", 44);
        let mut fetches: HashMap<String, FetchResult<'_>> = HashMap::new();
        fetches.insert("w1".into(), Ok(w1.as_slice()));

        let snapshot = build_snapshot(2, now(), &config, &fetches, 2.0);
        let weld = snapshot.process("weld").unwrap();
        // 100 * 45 / 44 = 102.27..
        assert_eq!(weld.metrics.efficiency, 102.3);
        // 3600 / 44 = 81.81..
        assert_eq!(weld.metrics.throughput, 81.8);
    }

    #[test]
    fn serializes_states_in_lowercase() {
        let config = config();
        let fetches: HashMap<String, FetchResult<'_>> = HashMap::new();
        let snapshot = build_snapshot(1, now(), &config, &fetches, 2.0);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["equipment"][0]["state"], "error");
        assert_eq!(json["processes"][1]["topology"], "SEQUENTIAL");
        assert_eq!(json["processes"][0]["metrics"]["outlier_status"], "normal");
    }
}
