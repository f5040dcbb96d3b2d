//! Every configured equipment source, keyed by equipment id.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use linewatch_core::config::LineConfig;
use linewatch_core::record::EventRecord;

use crate::error::SourceError;
use crate::source::{EquipmentSource, SourceConfig};
use crate::transport::LogTransport;

/// Result of fetching one equipment.
pub type FetchOutcome = Result<Arc<Vec<EventRecord>>, SourceError>;

pub struct SourceRegistry {
    /// Configuration order, used for fan-out and reporting.
    order: Vec<String>,
    sources: HashMap<String, Arc<EquipmentSource>>,
}

impl SourceRegistry {
    /// Create one source per configured equipment, all sharing `transport`.
    pub fn new(config: &LineConfig, transport: Arc<dyn LogTransport>, policy: SourceConfig) -> Self {
        let mut order = Vec::with_capacity(config.equipment.len());
        let mut sources = HashMap::with_capacity(config.equipment.len());
        for descriptor in &config.equipment {
            order.push(descriptor.id.clone());
            sources.insert(
                descriptor.id.clone(),
                Arc::new(EquipmentSource::new(
                    descriptor.clone(),
                    config.line_id.clone(),
                    Arc::clone(&transport),
                    policy,
                )),
            );
        }
        Self { order, sources }
    }

    pub fn source_count(&self) -> usize {
        self.order.len()
    }

    /// Fetch one equipment by id.
    pub async fn fetch(&self, equipment_id: &str) -> FetchOutcome {
        match self.sources.get(equipment_id) {
            Some(source) => source.fetch().await,
            None => Err(SourceError::UnknownEquipment(equipment_id.to_string())),
        }
    }

    /// Fetch every equipment concurrently and wait for all of them to settle.
    ///
    /// One failure never cancels the others; results come back in
    /// configuration order.
    pub async fn fetch_all(&self) -> Vec<(String, FetchOutcome)> {
        let fetches = self.order.iter().map(|id| async move {
            let outcome = self.fetch(id).await;
            (id.clone(), outcome)
        });
        join_all(fetches).await
    }

    /// Drop every cached batch.
    pub fn clear_cache(&self) {
        for source in self.sources.values() {
            source.invalidate();
        }
        tracing::debug!(sources = self.sources.len(), "Cleared equipment log caches");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
