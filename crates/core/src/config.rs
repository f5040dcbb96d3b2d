//! Static line configuration: equipment endpoints and process topology.
//!
//! Loaded once at startup from a JSON document and validated before any
//! polling starts. Nothing in here is mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cycle_time::CycleStrategy;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// One polled piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentDescriptor {
    pub id: String,
    /// HTTP(S) URL of the equipment's plain-text event log.
    pub endpoint: String,
    pub display_name: String,
    /// How cycle times are reconstructed for this class of equipment.
    #[serde(default)]
    pub strategy: CycleStrategy,
}

/// How the equipment of a process relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topology {
    /// Single path: every unit passes every station in order.
    Sequential,
    /// Redundant stations: a unit passes exactly one of them.
    Parallel,
}

/// How per-equipment results are reported inside a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// Each equipment is reported on its own.
    #[default]
    Individual,
    /// Each equipment is reported with its share of the process observations.
    WeightedAverage,
}

/// One process (group of stations) on the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub name: String,
    pub display_name: String,
    /// Ordered, duplicate-free list of equipment ids.
    pub equipment_ids: Vec<String>,
    pub topology: Topology,
    pub design_time_seconds: f64,
    #[serde(default)]
    pub aggregation: Aggregation,
}

// ---------------------------------------------------------------------------
// LineConfig
// ---------------------------------------------------------------------------

/// The complete static description of a monitored line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Line identifier every log record must carry.
    pub line_id: String,
    pub display_name: String,
    pub equipment: Vec<EquipmentDescriptor>,
    pub processes: Vec<ProcessDescriptor>,
}

impl LineConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a configuration document.
    pub fn from_json_str(content: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-references and value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.line_id.trim().is_empty() {
            return Err(CoreError::Validation("line_id must not be empty".into()));
        }

        let mut equipment_ids = HashSet::new();
        for eq in &self.equipment {
            if eq.id.trim().is_empty() {
                return Err(CoreError::Validation("equipment id must not be empty".into()));
            }
            if !equipment_ids.insert(eq.id.as_str()) {
                return Err(CoreError::Validation(format!(
                    "duplicate equipment id '{}'",
                    eq.id
                )));
            }
            validate_endpoint(eq)?;
        }

        let mut process_names = HashSet::new();
        for process in &self.processes {
            if !process_names.insert(process.name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "duplicate process name '{}'",
                    process.name
                )));
            }
            if !(process.design_time_seconds.is_finite() && process.design_time_seconds > 0.0) {
                return Err(CoreError::Validation(format!(
                    "process '{}' design_time_seconds must be a positive number",
                    process.name
                )));
            }
            let mut seen = HashSet::new();
            for id in &process.equipment_ids {
                if !equipment_ids.contains(id.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "process '{}' references unknown equipment '{id}'",
                        process.name
                    )));
                }
                if !seen.insert(id.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "process '{}' lists equipment '{id}' twice",
                        process.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a process by name.
    pub fn process(&self, name: &str) -> Result<&ProcessDescriptor, CoreError> {
        self.processes
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CoreError::NotFound {
                entity: "process",
                id: name.to_string(),
            })
    }

    /// Look up an equipment by id.
    pub fn equipment(&self, id: &str) -> Result<&EquipmentDescriptor, CoreError> {
        self.equipment
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "equipment",
                id: id.to_string(),
            })
    }
}

/// An endpoint must be an absolute http(s) URL with a host.
fn validate_endpoint(eq: &EquipmentDescriptor) -> Result<(), CoreError> {
    let invalid = |reason: &str| {
        CoreError::Validation(format!(
            "equipment '{}' endpoint '{}' {reason}",
            eq.id, eq.endpoint
        ))
    };

    let url = eq
        .endpoint
        .parse::<url::Url>()
        .map_err(|e| invalid(&format!("is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("must use http or https"));
    }
    if url.host_str().unwrap_or_default().is_empty() {
        return Err(invalid("has no host"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
