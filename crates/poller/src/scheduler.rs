//! The polling scheduler.
//!
//! Lifecycle is `Idle → Polling → Idle`. While polling, a single driver task
//! fires a tick immediately and then every `poll_interval`. Each tick runs in
//! its own task: it fetches every equipment concurrently (settle-all), builds
//! one snapshot and publishes it. Ticks may overlap while fetching, up to
//! [`MAX_OVERLAPPING_TICKS`]; a timer firing beyond that is skipped. A tick
//! that finds an equipment read in flight joins it instead of issuing its
//! own. Publication is serialized and a tick older than the last published
//! one is dropped. Stopping ends the driver, closes all subscriptions and
//! clears the source caches; ticks still fetching run to completion and
//! their snapshots are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use linewatch_collector::{LogTransport, SourceRegistry};
use linewatch_core::aggregate::ProcessSnapshot;
use linewatch_core::snapshot::{build_snapshot, EquipmentStatus, FetchResult};
use linewatch_core::types::Timestamp;
use linewatch_core::{CoreError, LineConfig, LineSnapshot};
use linewatch_events::SnapshotHub;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::error::PollerError;
use crate::stats::{PollingState, SystemStats, TickStats};

/// Ticks allowed to be fetching at the same time.
pub const MAX_OVERLAPPING_TICKS: usize = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    started_at: Timestamp,
}

/// Keeps a counter raised for as long as it is held.
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn register(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }

    /// Take over an increment made before the guard could be created.
    fn adopt(counter: &'a AtomicUsize) -> Self {
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    line: Arc<LineConfig>,
    registry: SourceRegistry,
    hub: Arc<SnapshotHub>,
    config: PollerConfig,
    next_tick: AtomicU64,
    active_timers: AtomicUsize,
    ticks_in_flight: AtomicUsize,
    /// Serializes start and stop, so a start waits for a stop to finish.
    lifecycle: tokio::sync::Mutex<()>,
    run: Mutex<Option<RunHandle>>,
    /// Tick number of the last published snapshot. Held while publishing.
    published: Mutex<u64>,
    latest: RwLock<Option<Arc<LineSnapshot>>>,
    stats: Mutex<TickStats>,
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Handle to the polling scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<Inner>,
}

impl Poller {
    pub fn new(
        line: LineConfig,
        transport: Arc<dyn LogTransport>,
        hub: Arc<SnapshotHub>,
        config: PollerConfig,
    ) -> Self {
        let registry = SourceRegistry::new(&line, transport, config.source_config());
        Self {
            inner: Arc::new(Inner {
                line: Arc::new(line),
                registry,
                hub,
                config,
                next_tick: AtomicU64::new(0),
                active_timers: AtomicUsize::new(0),
                ticks_in_flight: AtomicUsize::new(0),
                lifecycle: tokio::sync::Mutex::new(()),
                run: Mutex::new(None),
                published: Mutex::new(0),
                latest: RwLock::new(None),
                stats: Mutex::new(TickStats::default()),
            }),
        }
    }

    /// Begin polling. Starting while already polling only reports the state.
    pub async fn start(&self) -> PollingState {
        let _lifecycle = self.inner.lifecycle.lock().await;
        {
            let mut run = lock(&self.inner.run);
            if run.is_some() {
                tracing::debug!("Polling already running");
            } else {
                let cancel = CancellationToken::new();
                let task = tokio::spawn(run_loop(Arc::clone(&self.inner), cancel.clone()));
                *run = Some(RunHandle {
                    cancel,
                    task,
                    started_at: Utc::now(),
                });
                tracing::info!(
                    interval_secs = self.inner.config.poll_interval.as_secs(),
                    equipment = self.inner.registry.source_count(),
                    "Polling started"
                );
            }
        }
        self.state()
    }

    /// Stop polling. Stopping while idle only reports the state.
    ///
    /// Results of ticks still in flight are discarded; nothing is published
    /// once this returns.
    pub async fn stop(&self) -> PollingState {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let handle = lock(&self.inner.run).take();
        match handle {
            Some(handle) => {
                handle.cancel.cancel();
                // A tick publishing right now finishes first; later ones see
                // the cancellation.
                drop(lock(&self.inner.published));
                self.inner.hub.close_all();
                self.inner.registry.clear_cache();
                if let Err(e) = handle.task.await {
                    tracing::warn!(error = %e, "Polling loop ended abnormally");
                }
                tracing::info!("Polling stopped");
            }
            None => tracing::debug!("Polling already stopped"),
        }
        self.state()
    }

    /// Run one tick now and return its snapshot.
    pub async fn refresh(&self) -> Result<Arc<LineSnapshot>, PollerError> {
        let cancel = lock(&self.inner.run)
            .as_ref()
            .map(|h| h.cancel.clone())
            .unwrap_or_else(CancellationToken::new);
        let tick = self.inner.next_tick();
        self.inner.run_tick(tick, &cancel).await
    }

    /// Last published snapshot, if any.
    pub fn live_data(&self) -> Option<Arc<LineSnapshot>> {
        self.inner.latest()
    }

    /// One process from the last published snapshot.
    pub fn process_data(&self, name: &str) -> Result<ProcessSnapshot, PollerError> {
        self.inner.line.process(name)?;
        let latest = self.live_data().ok_or(PollerError::NoData)?;
        latest.process(name).cloned().ok_or_else(|| {
            PollerError::Config(CoreError::NotFound {
                entity: "process",
                id: name.to_string(),
            })
        })
    }

    /// One equipment's fetch status from the last published snapshot.
    pub fn equipment_status(&self, id: &str) -> Result<EquipmentStatus, PollerError> {
        self.inner.line.equipment(id)?;
        let latest = self.live_data().ok_or(PollerError::NoData)?;
        latest.equipment_status(id).cloned().ok_or_else(|| {
            PollerError::Config(CoreError::NotFound {
                entity: "equipment",
                id: id.to_string(),
            })
        })
    }

    pub fn configuration(&self) -> &Arc<LineConfig> {
        &self.inner.line
    }

    pub fn hub(&self) -> &Arc<SnapshotHub> {
        &self.inner.hub
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.inner.run).is_some()
    }

    /// Number of running driver loops (0 or 1).
    pub fn active_timers(&self) -> usize {
        self.inner.active_timers.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PollingState {
        let started_at = lock(&self.inner.run).as_ref().map(|h| h.started_at);
        let last_tick = *lock(&self.inner.published);
        PollingState {
            polling: started_at.is_some(),
            started_at,
            poll_interval_secs: self.inner.config.poll_interval.as_secs(),
            last_tick: (last_tick > 0).then_some(last_tick),
        }
    }

    pub fn system_stats(&self) -> SystemStats {
        let state = self.state();
        let stats = lock(&self.inner.stats).clone();
        SystemStats {
            polling: state.polling,
            started_at: state.started_at,
            ticks_completed: stats.ticks_completed,
            ticks_discarded: stats.ticks_discarded,
            ticks_skipped: stats.ticks_skipped,
            last_tick_at: stats.last_tick_at,
            last_tick_duration_ms: stats.last_tick_duration_ms,
            equipment_total: self.inner.registry.source_count(),
            equipment_failed_last_tick: stats.equipment_failed_last_tick,
            subscribers: self.inner.hub.subscriber_count(),
            poll_interval_secs: state.poll_interval_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Tick execution
// ---------------------------------------------------------------------------

impl Inner {
    fn next_tick(&self) -> u64 {
        self.next_tick.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn latest(&self) -> Option<Arc<LineSnapshot>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn run_tick(
        &self,
        tick: u64,
        cancel: &CancellationToken,
    ) -> Result<Arc<LineSnapshot>, PollerError> {
        let started = Instant::now();
        tracing::debug!(tick, "Polling tick started");

        let results = self.registry.fetch_all().await;

        let fetches: HashMap<String, FetchResult<'_>> = results
            .iter()
            .map(|(id, outcome)| {
                let result = match outcome {
                    Ok(records) => Ok(records.as_slice()),
                    Err(e) => Err(e.to_string()),
                };
                (id.clone(), result)
            })
            .collect();

        let snapshot = Arc::new(build_snapshot(
            tick,
            Utc::now(),
            &self.line,
            &fetches,
            self.config.outlier_sigma,
        ));
        self.publish(snapshot, cancel, started.elapsed())
    }

    /// Publish in tick order; stale or cancelled ticks are dropped.
    fn publish(
        &self,
        snapshot: Arc<LineSnapshot>,
        cancel: &CancellationToken,
        elapsed: Duration,
    ) -> Result<Arc<LineSnapshot>, PollerError> {
        let tick = snapshot.tick;
        let mut last_published = lock(&self.published);

        if cancel.is_cancelled() {
            return Err(self.discard(tick, "polling stopped"));
        }
        if tick <= *last_published {
            return Err(self.discard(tick, "newer tick already published"));
        }

        *last_published = tick;
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&snapshot));
        let delivered = self.hub.publish(Arc::clone(&snapshot));

        let failed = snapshot.failed_equipment();
        let duration_ms = elapsed.as_millis() as u64;
        {
            let mut stats = lock(&self.stats);
            stats.ticks_completed += 1;
            stats.last_tick_at = Some(snapshot.generated_at);
            stats.last_tick_duration_ms = Some(duration_ms);
            stats.equipment_failed_last_tick = failed;
        }

        tracing::info!(tick, delivered, failed, duration_ms, "Polling tick published");
        Ok(snapshot)
    }

    fn discard(&self, tick: u64, reason: &'static str) -> PollerError {
        lock(&self.stats).ticks_discarded += 1;
        tracing::debug!(tick, reason, "Polling tick discarded");
        PollerError::Discarded(tick)
    }
}

/// Fire a tick immediately, then every `poll_interval`, until cancelled.
async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let _timer = CountGuard::register(&inner.active_timers);
    let mut interval = tokio::time::interval(inner.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Polling loop stopping");
                break;
            }
            _ = interval.tick() => {
                let in_flight = inner.ticks_in_flight.load(Ordering::SeqCst);
                if in_flight >= MAX_OVERLAPPING_TICKS {
                    lock(&inner.stats).ticks_skipped += 1;
                    tracing::warn!(in_flight, "Earlier ticks still fetching, skipping this one");
                    continue;
                }
                let tick = inner.next_tick();
                inner.ticks_in_flight.fetch_add(1, Ordering::SeqCst);
                let inner = Arc::clone(&inner);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _in_flight = CountGuard::adopt(&inner.ticks_in_flight);
                    if let Err(e) = inner.run_tick(tick, &cancel).await {
                        tracing::debug!(tick, error = %e, "Polling tick produced no snapshot");
                    }
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use linewatch_collector::{MemoryTransport, SourceError};
    use linewatch_core::parser::TIMESTAMP_FORMAT;

    use super::*;

    const CONFIG: &str = r#"{
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
    }"#;

    const ENDPOINTS: [&str; 4] = ["http://p1/log", "http://p2/log", "http://p3/log", "http://w1/log"];

    /// `count` paired cycles of `seconds` each, one unit every 100 s.
    fn paired_log(equipment: &str, count: i64, seconds: i64) -> String {
        let base = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        (0..count)
            .flat_map(|i| {
                let start = base + chrono::Duration::seconds(i * 100);
                let end = start + chrono::Duration::seconds(seconds);
                [
                    format!("{equipment}-{i},L1,PN,proc,{equipment},REQUEST,{}", start.format(TIMESTAMP_FORMAT)),
                    format!("{equipment}-{i},L1,PN,proc,{equipment},COMPLETE_OK,{}", end.format(TIMESTAMP_FORMAT)),
                ]
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn test_config() -> PollerConfig {
        PollerConfig {
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(1),
            ..PollerConfig::default()
        }
    }

    fn setup() -> (Poller, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond("http://p1/log", paired_log("p1", 3, 28));
        transport.respond("http://p2/log", paired_log("p2", 3, 30));
        transport.respond("http://p3/log", paired_log("p3", 3, 32));
        transport.respond("http://w1/log", paired_log("w1", 3, 45));
        let poller = Poller::new(
            LineConfig::from_json_str(CONFIG).unwrap(),
            transport.clone(),
            Arc::new(SnapshotHub::new()),
            test_config(),
        );
        (poller, transport)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn latest_tick(poller: &Poller) -> u64 {
        poller.live_data().map(|s| s.tick).unwrap_or(0)
    }

    // -- refresh --

    #[tokio::test]
    async fn refresh_publishes_to_subscribers() {
        let (poller, _) = setup();
        let mut sub = poller.hub().subscribe();

        let snapshot = poller.refresh().await.unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.failed_equipment(), 0);
        assert_eq!(snapshot.summary.total_pieces, 12);

        assert_eq!(sub.receiver.recv().await.unwrap().tick, 1);
        assert_eq!(latest_tick(&poller), 1);
        assert_eq!(poller.system_stats().ticks_completed, 1);
        assert_eq!(poller.state().last_tick, Some(1));
    }

    #[tokio::test]
    async fn two_of_three_parallel_failures_still_publish() {
        let (poller, transport) = setup();
        transport.fail("http://p1/log", SourceError::Timeout);
        transport.fail("http://p3/log", SourceError::Network("HTTP 500".into()));
        let mut sub = poller.hub().subscribe();

        let snapshot = poller.refresh().await.unwrap();
        let press = snapshot.process("press").unwrap();
        assert_eq!(press.metrics.real_time, 30.0);
        assert_eq!(press.metrics.cycle_count, 3);
        assert_eq!(snapshot.failed_equipment(), 2);
        assert!(sub.receiver.recv().await.is_some());
        assert_eq!(poller.system_stats().equipment_failed_last_tick, 2);
    }

    #[tokio::test]
    async fn process_data_lookups() {
        let (poller, _) = setup();
        assert_matches!(poller.process_data("press"), Err(PollerError::NoData));
        assert_matches!(
            poller.process_data("paint"),
            Err(PollerError::Config(CoreError::NotFound { entity: "process", .. }))
        );

        poller.refresh().await.unwrap();
        let weld = poller.process_data("weld").unwrap();
        assert_eq!(weld.metrics.real_time, 45.0);
        assert_eq!(weld.metrics.efficiency, 100.0);
    }

    #[tokio::test]
    async fn equipment_status_lookups() {
        let (poller, transport) = setup();
        assert_matches!(poller.equipment_status("p1"), Err(PollerError::NoData));
        assert_matches!(
            poller.equipment_status("p9"),
            Err(PollerError::Config(CoreError::NotFound { entity: "equipment", .. }))
        );

        transport.fail("http://w1/log", SourceError::Timeout);
        poller.refresh().await.unwrap();
        let press = poller.equipment_status("p2").unwrap();
        assert_eq!(press.record_count, 6);
        assert!(press.error.is_none());
        let welder = poller.equipment_status("w1").unwrap();
        assert_eq!(welder.error.as_deref(), Some("Request timed out"));
    }

    // -- lifecycle --

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_periodic() {
        let (poller, _) = setup();
        let state = poller.start().await;
        assert!(state.polling);

        wait_for(|| latest_tick(&poller) == 1).await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        wait_for(|| latest_tick(&poller) == 2).await;

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_runs_one_timer() {
        let (poller, _) = setup();
        let first = poller.start().await;
        let second = poller.start().await;

        assert!(first.polling);
        assert!(second.polling);
        assert_eq!(first.started_at, second.started_at);

        wait_for(|| poller.active_timers() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(poller.active_timers(), 1);

        let stopped = poller.stop().await;
        assert!(!stopped.polling);
        assert_eq!(poller.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_subscriptions_and_is_idempotent() {
        let (poller, _) = setup();
        poller.start().await;
        wait_for(|| latest_tick(&poller) == 1).await;
        let mut sub = poller.hub().subscribe();

        assert!(!poller.stop().await.polling);
        assert!(sub.receiver.recv().await.is_none());
        assert_eq!(poller.hub().subscriber_count(), 0);

        let again = poller.stop().await;
        assert!(!again.polling);
        assert_eq!(again.started_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_tick_is_discarded_on_stop() {
        let (poller, transport) = setup();
        for endpoint in ENDPOINTS {
            transport.set_delay(endpoint, Duration::from_secs(5));
        }

        poller.start().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.stop().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(poller.system_stats().ticks_discarded, 1);
        assert!(poller.live_data().is_none());
        assert_eq!(poller.system_stats().ticks_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_in_flight_reads_finish() {
        let (poller, transport) = setup();
        transport.fail_then_respond("http://p1/log", 1, SourceError::Timeout, paired_log("p1", 3, 28));
        transport.set_delay("http://p1/log", Duration::from_secs(5));

        poller.start().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.stop().await;
        assert_eq!(transport.calls("http://p1/log"), 1);

        // The read keeps going: its retry still reaches the endpoint.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.calls("http://p1/log"), 2);
        assert!(poller.live_data().is_none());
        assert_eq!(poller.system_stats().ticks_discarded, 1);

        // Its batch arrived after the caches were cleared and was not kept.
        poller.refresh().await.unwrap();
        assert_eq!(transport.calls("http://p1/log"), 3);
    }

    #[tokio::test]
    async fn start_waits_for_a_stop_in_progress() {
        let (poller, _) = setup();
        poller.start().await;
        wait_for(|| poller.active_timers() == 1).await;

        let restart = async {
            let state = poller.start().await;
            (state, poller.active_timers())
        };
        let (stopped, (started, timers_at_start)) = tokio::join!(poller.stop(), restart);

        assert!(!stopped.polling);
        assert!(started.polling);
        // The old driver was gone before the new one was spawned.
        assert_eq!(timers_at_start, 0);

        wait_for(|| poller.active_timers() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(poller.active_timers(), 1);
        poller.stop().await;
        assert_eq!(poller.active_timers(), 0);
    }

    // -- overlap --

    fn issued_ticks(poller: &Poller) -> u64 {
        poller.inner.next_tick.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_failing_equipment_does_not_build_a_backlog() {
        let (poller, transport) = {
            let transport = Arc::new(MemoryTransport::new());
            transport.respond("http://p2/log", paired_log("p2", 3, 30));
            transport.respond("http://p3/log", paired_log("p3", 3, 32));
            transport.respond("http://w1/log", paired_log("w1", 3, 45));
            let poller = Poller::new(
                LineConfig::from_json_str(CONFIG).unwrap(),
                transport.clone(),
                Arc::new(SnapshotHub::new()),
                PollerConfig::default(),
            );
            (poller, transport)
        };
        // Each read sequence takes 4 × 10 s plus 12 s of backoff.
        transport.fail("http://p1/log", SourceError::Timeout);
        transport.set_delay("http://p1/log", Duration::from_secs(10));

        poller.start().await;
        let mut last_published = 0;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(300)).await;
            let published = latest_tick(&poller);
            let issued = issued_ticks(&poller);
            assert!(published > last_published, "no progress at tick {issued}");
            assert!(
                issued - published <= MAX_OVERLAPPING_TICKS as u64,
                "issued {issued}, published {published}"
            );
            last_published = published;
        }

        // Ticks that overlap share one read sequence per equipment.
        let reads = transport.calls("http://p1/log") as u64;
        assert!(reads <= issued_ticks(&poller) / 2 * 4 + 4, "reads {reads}");
        assert_eq!(poller.live_data().unwrap().failed_equipment(), 1);
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timer_skips_ticks_while_overlap_is_full() {
        let (poller, transport) = setup();
        for endpoint in ENDPOINTS {
            transport.set_delay(endpoint, Duration::from_secs(100));
        }

        poller.start().await;
        // Ticks fire at 0 s and 30 s; those at 60 s and 90 s find two in flight.
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(issued_ticks(&poller), 2);
        assert_eq!(poller.system_stats().ticks_skipped, 2);
        assert!(poller.live_data().is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(latest_tick(&poller), 2);
        assert_eq!(transport.calls("http://w1/log"), 1);
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_source_caches() {
        let (poller, transport) = setup();
        poller.start().await;
        wait_for(|| latest_tick(&poller) == 1).await;
        assert_eq!(transport.calls("http://p2/log"), 1);

        poller.stop().await;
        poller.refresh().await.unwrap();
        assert_eq!(transport.calls("http://p2/log"), 2);
    }

    #[tokio::test]
    async fn refresh_within_ttl_uses_cache() {
        let (poller, transport) = setup();
        poller.refresh().await.unwrap();
        poller.refresh().await.unwrap();
        assert_eq!(transport.calls("http://w1/log"), 1);
        assert_eq!(latest_tick(&poller), 2);
    }

    // -- ordering --

    #[tokio::test]
    async fn stale_tick_is_not_published() {
        let (poller, _) = setup();
        let line = LineConfig::from_json_str(CONFIG).unwrap();
        let snapshot = |tick| Arc::new(build_snapshot(tick, Utc::now(), &line, &HashMap::new(), 2.0));
        let never = CancellationToken::new();

        assert!(poller.inner.publish(snapshot(5), &never, Duration::ZERO).is_ok());
        assert_matches!(
            poller.inner.publish(snapshot(3), &never, Duration::ZERO),
            Err(PollerError::Discarded(3))
        );
        assert_eq!(latest_tick(&poller), 5);
        assert_eq!(poller.system_stats().ticks_discarded, 1);
    }

    #[tokio::test]
    async fn cancelled_tick_is_not_published() {
        let (poller, _) = setup();
        let line = LineConfig::from_json_str(CONFIG).unwrap();
        let snapshot = Arc::new(build_snapshot(1, Utc::now(), &line, &HashMap::new(), 2.0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_matches!(
            poller.inner.publish(snapshot, &cancel, Duration::ZERO),
            Err(PollerError::Discarded(1))
        );
        assert!(poller.live_data().is_none());
    }

    #[test]
    fn system_stats_reflect_configuration() {
        let (poller, _) = setup();
        let _sub = poller.hub().subscribe();
        let stats = poller.system_stats();
        assert!(!stats.polling);
        assert_eq!(stats.equipment_total, 4);
        assert_eq!(stats.poll_interval_secs, 30);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.last_tick_at, None);
    }
}
