//! Equipment → process → line metric aggregation.
//!
//! Pure logic. Every call recomputes from the observations it is given; no
//! state survives between polling ticks. Values are kept at full precision
//! here and rounded only when a snapshot is published
//! (see [`crate::snapshot`]).
//!
//! The fallback values below are product-defined policy, not derived
//! quantities.

use serde::Serialize;

use crate::config::{Aggregation, EquipmentDescriptor, ProcessDescriptor, Topology};
use crate::cycle_time::{CycleTimeObservation, PieceTally};
use crate::outlier::{self, OutlierAnalysis, OutlierStatus};
use crate::record::EventRecord;

// ---------------------------------------------------------------------------
// Policy constants
// ---------------------------------------------------------------------------

/// Efficiency reported for a process with no observations.
pub const NO_DATA_EFFICIENCY: f64 = 95.0;
/// OEE reported for a process whose equipment produced no observations.
pub const NO_DATA_OEE: f64 = 95.0;
/// Lower bound applied to every OEE contribution.
pub const OEE_FLOOR: f64 = 85.0;
/// Number of most recent observations averaged into the real-time figure.
pub const REAL_TIME_WINDOW: usize = 10;
/// Number of most recent observations behind the hourly average.
pub const HOURLY_WINDOW: usize = 60;
/// Sigma multiplier used when trimming the hourly average.
pub const HOURLY_TRIM_SIGMA: f64 = 2.0;
/// Uptime is approximated by the average OEE clamped into this range.
pub const UPTIME_MIN: f64 = 90.0;
pub const UPTIME_MAX: f64 = 100.0;

pub const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Equipment level
// ---------------------------------------------------------------------------

/// Per-equipment rollup for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentMetrics {
    pub equipment_id: String,
    pub cycle_times: Vec<CycleTimeObservation>,
    pub pieces: PieceTally,
    pub outlier_analysis: OutlierAnalysis,
    pub record_count: usize,
}

impl EquipmentMetrics {
    /// Reconstruct cycle times for one equipment batch and analyse them.
    pub fn from_records(equipment: &EquipmentDescriptor, records: &[EventRecord], k: f64) -> Self {
        let reconstruction = equipment.strategy.reconstruct(records, &equipment.id);
        let seconds: Vec<f64> = reconstruction.observations.iter().map(|o| o.seconds).collect();
        Self {
            equipment_id: equipment.id.clone(),
            outlier_analysis: outlier::detect(&seconds, k),
            cycle_times: reconstruction.observations,
            pieces: reconstruction.pieces,
            record_count: records.len(),
        }
    }

    /// An equipment that contributed nothing this tick (e.g. fetch failed).
    pub fn empty(equipment_id: impl Into<String>) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            cycle_times: Vec::new(),
            pieces: PieceTally::default(),
            outlier_analysis: OutlierAnalysis::default(),
            record_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Process level
// ---------------------------------------------------------------------------

/// Headline metrics for one process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub real_time: f64,
    pub hourly_average: f64,
    pub oee: f64,
    pub efficiency: f64,
    pub outlier_percentage: f64,
    pub outlier_status: OutlierStatus,
    pub throughput: f64,
    pub cycle_count: usize,
    pub outlier_count: usize,
}

/// One equipment's contribution to its process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentBreakdown {
    pub equipment_id: String,
    /// Mean of the equipment's most recent observations, if any.
    pub real_time: Option<f64>,
    pub cycle_count: usize,
    pub outlier_percentage: f64,
    pub pieces: PieceTally,
    /// Share of the process observations, in percent. Only reported for
    /// [`Aggregation::WeightedAverage`] processes.
    pub weight_percent: Option<f64>,
}

/// Full result for one process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    pub name: String,
    pub display_name: String,
    pub topology: Topology,
    pub design_time_seconds: f64,
    pub metrics: ProcessMetrics,
    pub pieces: PieceTally,
    pub equipment: Vec<EquipmentBreakdown>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Most recent first; ties keep their input order.
fn recent_first(observations: &mut [&CycleTimeObservation]) {
    observations.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
}

/// Combine every equipment of `process` into one process result.
///
/// Equipment listed by the process but absent from `equipment` is treated as
/// having produced nothing this tick.
pub fn aggregate_process(
    process: &ProcessDescriptor,
    equipment: &[EquipmentMetrics],
    k: f64,
) -> ProcessSnapshot {
    let members: Vec<Option<&EquipmentMetrics>> = process
        .equipment_ids
        .iter()
        .map(|id| equipment.iter().find(|m| &m.equipment_id == id))
        .collect();

    let mut observations: Vec<&CycleTimeObservation> = members
        .iter()
        .flatten()
        .flat_map(|m| m.cycle_times.iter())
        .collect();
    recent_first(&mut observations);

    let design = process.design_time_seconds;
    let has_data = !observations.is_empty();

    let real_time = mean(observations.iter().take(REAL_TIME_WINDOW).map(|o| o.seconds))
        .unwrap_or(design);

    let hourly: Vec<f64> = observations.iter().take(HOURLY_WINDOW).map(|o| o.seconds).collect();
    let hourly_average = outlier::trimmed_mean(&hourly, HOURLY_TRIM_SIGMA).unwrap_or(real_time);

    let efficiency = if has_data {
        100.0 * design / real_time
    } else {
        NO_DATA_EFFICIENCY
    };

    let oee = if !has_data {
        NO_DATA_OEE
    } else {
        match process.topology {
            Topology::Parallel => mean(
                members
                    .iter()
                    .flatten()
                    .filter(|m| !m.cycle_times.is_empty())
                    .map(|m| OEE_FLOOR.max(100.0 - m.outlier_analysis.outlier_percentage)),
            )
            .unwrap_or(NO_DATA_OEE),
            Topology::Sequential => OEE_FLOOR.max(100.0 * design / real_time),
        }
    };

    let all_seconds: Vec<f64> = observations.iter().map(|o| o.seconds).collect();
    let analysis = outlier::detect(&all_seconds, k);

    let metrics = ProcessMetrics {
        real_time,
        hourly_average,
        oee,
        efficiency,
        outlier_percentage: analysis.outlier_percentage,
        outlier_status: analysis.status(),
        throughput: SECS_PER_HOUR / real_time,
        cycle_count: all_seconds.len(),
        outlier_count: analysis.outliers.len(),
    };

    let total_observations = all_seconds.len();
    let breakdown = process
        .equipment_ids
        .iter()
        .zip(&members)
        .map(|(id, member)| breakdown_for(id, *member, process.aggregation, total_observations))
        .collect();

    ProcessSnapshot {
        name: process.name.clone(),
        display_name: process.display_name.clone(),
        topology: process.topology,
        design_time_seconds: design,
        metrics,
        pieces: members.iter().flatten().map(|m| m.pieces).sum(),
        equipment: breakdown,
    }
}

fn breakdown_for(
    id: &str,
    member: Option<&EquipmentMetrics>,
    aggregation: Aggregation,
    process_observations: usize,
) -> EquipmentBreakdown {
    let (real_time, cycle_count, outlier_percentage, pieces) = match member {
        Some(m) => {
            let mut own: Vec<&CycleTimeObservation> = m.cycle_times.iter().collect();
            recent_first(&mut own);
            (
                mean(own.iter().take(REAL_TIME_WINDOW).map(|o| o.seconds)),
                m.cycle_times.len(),
                m.outlier_analysis.outlier_percentage,
                m.pieces,
            )
        }
        None => (None, 0, 0.0, PieceTally::default()),
    };

    let weight_percent = match aggregation {
        Aggregation::Individual => None,
        Aggregation::WeightedAverage if process_observations == 0 => Some(0.0),
        Aggregation::WeightedAverage => {
            Some(100.0 * cycle_count as f64 / process_observations as f64)
        }
    };

    EquipmentBreakdown {
        equipment_id: id.to_string(),
        real_time,
        cycle_count,
        outlier_percentage,
        pieces,
        weight_percent,
    }
}

// ---------------------------------------------------------------------------
// Line level
// ---------------------------------------------------------------------------

/// Line-wide summary across every process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSummary {
    pub total_pieces: u64,
    pub total_ok_pieces: u64,
    pub total_ng_pieces: u64,
    /// Sum of every process's real time (sequential value-stream view).
    pub total_cycle_time: f64,
    pub avg_oee: f64,
    pub avg_efficiency: f64,
    pub outlier_percentage: f64,
    pub throughput: f64,
    pub uptime: f64,
    pub quality_rate: f64,
}

/// Combine every process result into the line summary.
pub fn aggregate_line(processes: &[ProcessSnapshot]) -> LineSummary {
    let pieces: PieceTally = processes.iter().map(|p| p.pieces).sum();
    let total_cycle_time: f64 = processes.iter().map(|p| p.metrics.real_time).sum();
    let avg_oee = mean(processes.iter().map(|p| p.metrics.oee)).unwrap_or(0.0);
    let avg_efficiency = mean(processes.iter().map(|p| p.metrics.efficiency)).unwrap_or(0.0);

    let cycles: usize = processes.iter().map(|p| p.metrics.cycle_count).sum();
    let outliers: usize = processes.iter().map(|p| p.metrics.outlier_count).sum();
    let outlier_percentage = if cycles == 0 {
        0.0
    } else {
        100.0 * outliers as f64 / cycles as f64
    };

    let throughput = if total_cycle_time > 0.0 {
        SECS_PER_HOUR / total_cycle_time
    } else {
        0.0
    };

    let quality_rate = if pieces.total == 0 {
        100.0
    } else {
        100.0 * pieces.ok as f64 / pieces.total as f64
    };

    LineSummary {
        total_pieces: pieces.total,
        total_ok_pieces: pieces.ok,
        total_ng_pieces: pieces.ng,
        total_cycle_time,
        avg_oee,
        avg_efficiency,
        outlier_percentage,
        throughput,
        uptime: avg_oee.clamp(UPTIME_MIN, UPTIME_MAX),
        quality_rate,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
