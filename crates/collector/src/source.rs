//! One equipment's event log, with caching and retry.
//!
//! [`EquipmentSource::fetch`] serves a cached batch while it is younger than
//! the TTL. Otherwise it reads the endpoint, retrying with a linear backoff
//! (`backoff × attempt`), parses and sorts the lines newest first, truncates
//! the batch and caches it. At most one read per equipment is in flight:
//! callers arriving during a read join it and receive its outcome, whether
//! that is a batch or the terminal error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use linewatch_core::config::EquipmentDescriptor;
use linewatch_core::parser;
use linewatch_core::record::EventRecord;
use tokio::time::Instant;

use crate::error::SourceError;
use crate::transport::LogTransport;

/// Default lifetime of a cached batch.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default number of retries after the first failed read.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default backoff base; the wait before retry `n` is `n × base`.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Newest records kept per batch.
pub const MAX_RECORDS: usize = 1000;

/// Caching and retry policy shared by every source.
#[derive(Debug, Clone, Copy)]
pub struct SourceConfig {
    pub cache_ttl: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
    pub max_records: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            retries: DEFAULT_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_records: MAX_RECORDS,
        }
    }
}

type ReadOutcome = Result<Arc<Vec<EventRecord>>, SourceError>;

/// A read that every concurrent caller can await.
type SharedRead = Shared<BoxFuture<'static, ReadOutcome>>;

struct CachedBatch {
    records: Arc<Vec<EventRecord>>,
    fetched_at: Instant,
}

// ---------------------------------------------------------------------------
// EquipmentSource
// ---------------------------------------------------------------------------

pub struct EquipmentSource {
    inner: Arc<SourceInner>,
    in_flight: Mutex<Option<SharedRead>>,
}

/// State the in-flight read owns while detached from any one caller.
struct SourceInner {
    descriptor: EquipmentDescriptor,
    line_id: String,
    transport: Arc<dyn LogTransport>,
    config: SourceConfig,
    cache: Mutex<Option<CachedBatch>>,
    /// Bumped by [`EquipmentSource::invalidate`]; a read that started under an
    /// older generation does not populate the cache.
    generation: AtomicU64,
}

impl EquipmentSource {
    pub fn new(
        descriptor: EquipmentDescriptor,
        line_id: impl Into<String>,
        transport: Arc<dyn LogTransport>,
        config: SourceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                descriptor,
                line_id: line_id.into(),
                transport,
                config,
                cache: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
            in_flight: Mutex::new(None),
        }
    }

    pub fn equipment_id(&self) -> &str {
        &self.inner.descriptor.id
    }

    /// Return the equipment's newest records, from cache when fresh.
    pub async fn fetch(&self) -> ReadOutcome {
        if let Some(records) = self.inner.cached() {
            tracing::debug!(equipment_id = %self.equipment_id(), "Serving cached log batch");
            return Ok(records);
        }

        let read = self.join_or_start_read();
        let outcome = read.clone().await;

        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&read)) {
            *slot = None;
        }
        outcome
    }

    /// Drop the cached batch. A read already in flight will not repopulate it.
    pub fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        lock(&self.inner.cache).take();
    }

    fn join_or_start_read(&self) -> SharedRead {
        let mut slot = lock(&self.in_flight);
        // A settled read left behind by a caller that was dropped is stale.
        if let Some(read) = slot.as_ref().filter(|r| r.peek().is_none()) {
            tracing::debug!(equipment_id = %self.equipment_id(), "Joining in-flight log read");
            return read.clone();
        }

        let generation = self.inner.generation.load(Ordering::Acquire);
        let read = Arc::clone(&self.inner).read(generation).boxed().shared();
        *slot = Some(read.clone());
        read
    }
}

impl SourceInner {
    fn cached(&self) -> Option<Arc<Vec<EventRecord>>> {
        lock(&self.cache)
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.config.cache_ttl)
            .map(|c| Arc::clone(&c.records))
    }

    async fn read(self: Arc<Self>, generation: u64) -> ReadOutcome {
        let body = self.read_with_retry().await?;

        let mut records = parser::parse_batch(&body, &self.line_id);
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(self.config.max_records);
        let records = Arc::new(records);

        tracing::debug!(
            equipment_id = %self.descriptor.id,
            record_count = records.len(),
            "Fetched equipment log"
        );

        if self.generation.load(Ordering::Acquire) == generation {
            *lock(&self.cache) = Some(CachedBatch {
                records: Arc::clone(&records),
                fetched_at: Instant::now(),
            });
        }

        Ok(records)
    }

    async fn read_with_retry(&self) -> Result<String, SourceError> {
        let mut attempt: u32 = 0;
        loop {
            match self.transport.fetch_text(&self.descriptor.endpoint).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        equipment_id = %self.descriptor.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Equipment fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        equipment_id = %self.descriptor.id,
                        endpoint = %self.descriptor.endpoint,
                        error = %e,
                        "Equipment fetch failed after all retries"
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
