//! Cycle-time outlier detection.
//!
//! Uses the population mean and standard deviation (divide by `n`). A value
//! is an outlier when its distance from the mean reaches `k` standard
//! deviations. Fewer than [`MIN_SAMPLES`] values never produce outliers.

use serde::Serialize;

/// Default sigma multiplier.
pub const DEFAULT_SIGMA_MULTIPLIER: f64 = 2.0;

/// Below this many values the analysis is degenerate (no outliers, σ = 0).
pub const MIN_SAMPLES: usize = 3;

/// Outlier share at or below which a set is considered normal.
pub const NORMAL_MAX_PERCENT: f64 = 5.0;
/// Outlier share at or below which a set is a warning (above: critical).
pub const WARNING_MAX_PERCENT: f64 = 15.0;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Health classification derived from the outlier percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierStatus {
    Normal,
    Warning,
    Critical,
}

impl OutlierStatus {
    pub fn classify(outlier_percentage: f64) -> Self {
        if outlier_percentage <= NORMAL_MAX_PERCENT {
            Self::Normal
        } else if outlier_percentage <= WARNING_MAX_PERCENT {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Dispersion statistics for one set of cycle times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierAnalysis {
    pub mean: f64,
    pub std_dev: f64,
    pub outlier_percentage: f64,
    pub normal: Vec<f64>,
    pub outliers: Vec<f64>,
    /// `|x - mean| / std_dev` for every input value, in input order.
    /// All zero when the analysis is degenerate.
    pub sigma_levels: Vec<f64>,
}

impl OutlierAnalysis {
    pub fn sample_count(&self) -> usize {
        self.normal.len() + self.outliers.len()
    }

    pub fn status(&self) -> OutlierStatus {
        OutlierStatus::classify(self.outlier_percentage)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Partition `values` into normal and outlier sets at multiplier `k`.
pub fn detect(values: &[f64], k: f64) -> OutlierAnalysis {
    let mu = mean(values);

    if values.len() < MIN_SAMPLES {
        return OutlierAnalysis {
            mean: mu,
            std_dev: 0.0,
            outlier_percentage: 0.0,
            normal: values.to_vec(),
            outliers: Vec::new(),
            sigma_levels: vec![0.0; values.len()],
        };
    }

    let sigma = population_std_dev(values, mu);
    let mut normal = Vec::with_capacity(values.len());
    let mut outliers = Vec::new();
    let mut sigma_levels = Vec::with_capacity(values.len());

    for &v in values {
        let deviation = (v - mu).abs();
        sigma_levels.push(if sigma > 0.0 { deviation / sigma } else { 0.0 });
        // With σ = 0 every value equals the mean; nothing can be an outlier.
        if sigma > 0.0 && deviation >= k * sigma {
            outliers.push(v);
        } else {
            normal.push(v);
        }
    }

    let outlier_percentage = 100.0 * outliers.len() as f64 / values.len() as f64;

    OutlierAnalysis {
        mean: mu,
        std_dev: sigma,
        outlier_percentage,
        normal,
        outliers,
        sigma_levels,
    }
}

/// Mean of the values left after removing outliers at multiplier `k`.
///
/// Returns `None` for empty input so a genuine mean of zero is never
/// confused with "no data". Falls back to the unfiltered mean if every value
/// was removed.
pub fn trimmed_mean(values: &[f64], k: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let analysis = detect(values, k);
    if analysis.normal.is_empty() {
        Some(analysis.mean)
    } else {
        Some(mean(&analysis.normal))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
