use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{order_batch, PrefetchQueue};
use crate::cache::WeatherCache;
use crate::config::PrefetchOptions;
use crate::fetch::WeatherFetcher;
use crate::models::{DataKind, Location};
use crate::stats::{PrefetchCounters, SchedulerStats};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub enum SchedulerState {
    Uninitialized,
    Idle,
    Syncing,
    Stopped,
}

/// Result of a `sync` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed {
        processed: u64,
        succeeded: u64,
        failed: u64,
    },
    /// `shutdown` stopped the sync before the queue was drained. Not counted
    /// as a completed sync.
    Interrupted {
        processed: u64,
        succeeded: u64,
        failed: u64,
    },
    /// Another sync was in flight; this call was folded into it.
    AlreadyRunning,
    /// Scheduler not initialized, or already stopped.
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    Stopped,
}

/// Keeps candidate locations warm in a [`WeatherCache`].
///
/// Cheap to share: clones are handles to the same scheduler.
#[derive(Clone)]
pub struct PrefetchScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Arc<WeatherCache>,
    fetcher: Arc<dyn WeatherFetcher>,
    candidates: Mutex<Vec<Location>>,
    kinds: Vec<DataKind>,
    queue: PrefetchQueue,
    lifecycle: Mutex<Lifecycle>,
    options: Mutex<PrefetchOptions>,
    /// Single in-flight flag; at most one drain runs at a time.
    syncing: AtomicBool,
    inter_request_delay: Duration,
    counters: PrefetchCounters,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
    shutdown: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl PrefetchScheduler {
    pub fn new(
        cache: Arc<WeatherCache>,
        fetcher: Arc<dyn WeatherFetcher>,
        candidates: Vec<Location>,
        inter_request_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                fetcher,
                candidates: Mutex::new(candidates),
                kinds: vec![DataKind::Current],
                queue: PrefetchQueue::new(),
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                options: Mutex::new(PrefetchOptions::default()),
                syncing: AtomicBool::new(false),
                inter_request_delay,
                counters: PrefetchCounters::default(),
                last_sync_at: Mutex::new(None),
                shutdown: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Warm these data kinds for every location (default: current conditions).
    ///
    /// Only takes effect before the scheduler is shared.
    pub fn with_kinds(mut self, kinds: Vec<DataKind>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            if !kinds.is_empty() {
                inner.kinds = kinds;
            }
        }
        self
    }

    /// Start the scheduler. Returns `false` if it was already initialized
    /// (or stopped), in which case nothing changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(&self, options: PrefetchOptions) -> bool {
        {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if *lifecycle != Lifecycle::Uninitialized {
                let current = *lifecycle;
                debug!(state = ?current, "Prefetch scheduler already initialized");
                return false;
            }
            *lifecycle = Lifecycle::Running;
        }
        *lock(&self.inner.options) = options.clone();

        info!(
            concurrency = options.workers(),
            sync_interval_ms = options.sync_interval_ms,
            enable_sync = options.enable_sync,
            preload_on_start = options.preload_on_start,
            "Prefetch scheduler initialized"
        );

        if options.enable_sync {
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(inner.run_timer(options.sync_interval(), options.preload_on_start));
            *lock(&self.inner.timer) = Some(handle);
        } else if options.preload_on_start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.sync().await;
            });
        }
        true
    }

    /// Refill the queue from the candidate list and drain it.
    ///
    /// Overlapping calls collapse: if a sync is already running this returns
    /// [`SyncOutcome::AlreadyRunning`] immediately.
    pub async fn sync(&self) -> SyncOutcome {
        self.inner.sync().await
    }

    /// Queue one location for warming and start draining if idle.
    ///
    /// Returns `false` when the location has no usable coordinates or the
    /// scheduler is not running. Must be called from within a Tokio runtime.
    pub fn enqueue(&self, location: Location) -> bool {
        if !location.is_valid() {
            warn!(id = %location.id, "Rejecting prefetch location without valid coordinates");
            return false;
        }

        {
            // Held across the push so a concurrent shutdown cannot miss it
            let lifecycle = lock(&self.inner.lifecycle);
            if *lifecycle != Lifecycle::Running {
                let current = *lifecycle;
                debug!(id = %location.id, state = ?current, "Scheduler not running, ignoring enqueue");
                return false;
            }
            debug!(location = %location.label(), "Location enqueued for prefetch");
            self.inner.queue.push(location);
        }

        if self.inner.try_begin() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.drain().await;
            });
        }
        true
    }

    /// Replace the candidate list used by subsequent syncs.
    pub fn set_candidates(&self, candidates: Vec<Location>) {
        *lock(&self.inner.candidates) = candidates;
    }

    /// Stop the timer and drop the queue. In-flight fetches finish and are
    /// still written to the cache. Terminal.
    pub fn shutdown(&self) {
        {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if *lifecycle == Lifecycle::Stopped {
                return;
            }
            *lifecycle = Lifecycle::Stopped;
        }

        self.inner.shutdown.cancel();
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
        let dropped = self.inner.queue.len();
        self.inner.queue.clear();
        info!(dropped, "Prefetch scheduler stopped");
    }

    pub fn state(&self) -> SchedulerState {
        match *lock(&self.inner.lifecycle) {
            Lifecycle::Uninitialized => SchedulerState::Uninitialized,
            Lifecycle::Stopped => SchedulerState::Stopped,
            Lifecycle::Running if self.is_syncing() => SchedulerState::Syncing,
            Lifecycle::Running => SchedulerState::Idle,
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.inner.counters;
        SchedulerStats {
            state: self.state(),
            queue_depth: self.queue_depth(),
            is_syncing: self.is_syncing(),
            successes: counters.successes.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
            syncs_completed: counters.syncs_completed.load(Ordering::Relaxed),
            last_sync_at: *lock(&self.inner.last_sync_at),
        }
    }
}

impl Inner {
    fn is_running(&self) -> bool {
        *lock(&self.lifecycle) == Lifecycle::Running && !self.shutdown.is_cancelled()
    }

    /// Claim the in-flight flag.
    fn try_begin(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn sync(self: &Arc<Self>) -> SyncOutcome {
        if !self.is_running() {
            debug!("Scheduler not running, skipping sync");
            return SyncOutcome::Inactive;
        }
        if !self.try_begin() {
            debug!("Prefetch sync already running");
            return SyncOutcome::AlreadyRunning;
        }

        let Some(queued) = self.refill() else {
            self.syncing.store(false, Ordering::Release);
            debug!("Scheduler stopped before sync could start");
            return SyncOutcome::Inactive;
        };
        info!(queued, "Prefetch sync started");

        let processed = self.drain().await;
        let succeeded = self.counters.successes.load(Ordering::Relaxed);
        let failed = self.counters.errors.load(Ordering::Relaxed);

        if !self.is_running() {
            info!(processed, succeeded, failed, "Prefetch sync interrupted by shutdown");
            return SyncOutcome::Interrupted {
                processed,
                succeeded,
                failed,
            };
        }

        self.counters.finish_sync();
        *lock(&self.last_sync_at) = Some(Utc::now());
        info!(processed, succeeded, failed, "Prefetch sync complete");

        SyncOutcome::Completed {
            processed,
            succeeded,
            failed,
        }
    }

    /// Replace the queue with a freshly ordered batch and reset the per-sync
    /// counters. Returns the batch size, or `None` once the scheduler has
    /// stopped.
    fn refill(&self) -> Option<usize> {
        // Held across the replace so a concurrent shutdown cannot be undone
        let lifecycle = lock(&self.lifecycle);
        if *lifecycle != Lifecycle::Running {
            return None;
        }
        let batch = {
            let candidates = lock(&self.candidates);
            order_batch(&candidates, &mut rand::thread_rng())
        };
        let queued = batch.len();
        self.counters.begin_sync();
        self.queue.replace(batch);
        Some(queued)
    }

    /// Run workers until the queue is empty. Caller must hold the in-flight flag.
    async fn drain(self: &Arc<Self>) -> u64 {
        let mut processed = 0;
        loop {
            let workers = lock(&self.options).workers();
            let results = futures::future::join_all((0..workers).map(|id| self.worker(id))).await;
            processed += results.into_iter().sum::<u64>();

            self.syncing.store(false, Ordering::Release);

            // An enqueue can land after the last worker saw an empty queue but
            // before the flag dropped; pick it up here.
            if !self.is_running() || self.queue.is_empty() || !self.try_begin() {
                break;
            }
        }
        processed
    }

    async fn worker(&self, id: usize) -> u64 {
        let mut processed = 0;
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let Some(location) = self.queue.pop() else {
                break;
            };

            self.warm(&location).await;
            processed += 1;

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.inter_request_delay) => {}
            }
        }
        debug!(worker = id, processed, "Prefetch worker finished");
        processed
    }

    async fn warm(&self, location: &Location) {
        for &kind in &self.kinds {
            let Some(key) = location.cache_key(kind) else {
                self.counters.record_error();
                warn!(id = %location.id, "Skipping prefetch location without valid coordinates");
                return;
            };

            let lookup = self.cache.get(key, self.fetcher.as_ref()).await;
            if lookup.is_authoritative() {
                self.counters.record_success();
                debug!(location = %location.label(), %key, origin = ?lookup.origin, "Location warmed");
            } else {
                self.counters.record_error();
                warn!(location = %location.label(), %key, origin = ?lookup.origin, "Prefetch refresh failed");
            }
        }
    }

    async fn run_timer(self: Arc<Self>, period: Duration, preload_on_start: bool) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !preload_on_start {
            // The first tick fires immediately
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("Prefetch timer stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let inner = Arc::clone(&self);
                    tokio::spawn(async move {
                        inner.sync().await;
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheOptions;
    use crate::models::CacheKey;
    use crate::store::{EntryStore, MemoryStore};
    use crate::testing::ScriptedFetcher;
    use serde_json::json;

    fn passes(n: usize) -> Vec<Location> {
        (0..n)
            .map(|i| Location::new(format!("pass-{i}"), format!("Pass {i}"), 45.0 + i as f64 * 0.1, 7.0))
            .collect()
    }

    fn manual_options(concurrency: usize) -> PrefetchOptions {
        PrefetchOptions {
            preload_on_start: false,
            enable_sync: false,
            concurrency,
            ..Default::default()
        }
    }

    fn setup(
        fetcher: Arc<ScriptedFetcher>,
        candidates: Vec<Location>,
    ) -> (Arc<WeatherCache>, PrefetchScheduler) {
        let store = EntryStore::new(Arc::new(MemoryStore::new()));
        let cache = Arc::new(WeatherCache::new(&CacheOptions::default(), store));
        let scheduler = PrefetchScheduler::new(cache.clone(), fetcher, candidates, Duration::ZERO);
        (cache, scheduler)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..300 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (_, scheduler) = setup(fetcher, passes(2));
        assert_eq!(scheduler.state(), SchedulerState::Uninitialized);
        assert_eq!(scheduler.sync().await, SyncOutcome::Inactive);
        assert!(!scheduler.enqueue(Location::new("a", "A", 1.0, 1.0)));

        assert!(scheduler.initialize(manual_options(2)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        // Second initialize has no effect
        assert!(!scheduler.initialize(manual_options(8)));

        scheduler.shutdown();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.initialize(manual_options(2)));
        assert!(!scheduler.enqueue(Location::new("a", "A", 1.0, 1.0)));
        assert_eq!(scheduler.sync().await, SyncOutcome::Inactive);
        assert_eq!(scheduler.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_sync_warms_every_candidate() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({"temp": 10})));
        let (cache, scheduler) = setup(fetcher.clone(), passes(5));
        scheduler.initialize(manual_options(2));

        let outcome = scheduler.sync().await;
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                processed: 5,
                succeeded: 5,
                failed: 0
            }
        );
        assert_eq!(fetcher.calls(), 5);
        assert_eq!(cache.len(), 5);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.queue_depth(), 0);

        let stats = scheduler.stats();
        assert_eq!(stats.syncs_completed, 1);
        assert!(stats.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_second_sync_serves_fresh_entries_without_fetching() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({"temp": 10})));
        let (_, scheduler) = setup(fetcher.clone(), passes(4));
        scheduler.initialize(manual_options(2));

        scheduler.sync().await;
        let outcome = scheduler.sync().await;
        assert!(matches!(outcome, SyncOutcome::Completed { succeeded: 4, failed: 0, .. }));
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(json!({})).with_delay(Duration::from_millis(20)),
        );
        let (_, scheduler) = setup(fetcher.clone(), passes(12));
        scheduler.initialize(manual_options(3));

        scheduler.sync().await;
        assert_eq!(fetcher.calls(), 12);
        assert!(fetcher.max_in_flight() <= 3);
        assert!(fetcher.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_single_worker_never_overlaps() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(json!({})).with_delay(Duration::from_millis(5)),
        );
        let (_, scheduler) = setup(fetcher.clone(), passes(6));
        scheduler.initialize(manual_options(1));

        scheduler.sync().await;
        assert_eq!(fetcher.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_syncs_collapse() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(json!({})).with_delay(Duration::from_millis(10)),
        );
        let (_, scheduler) = setup(fetcher.clone(), passes(4));
        scheduler.initialize(manual_options(2));

        let (a, b) = tokio::join!(scheduler.sync(), scheduler.sync());
        let outcomes = [a, b];
        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, SyncOutcome::Completed { .. })).count(),
            1
        );
        assert!(outcomes.contains(&SyncOutcome::AlreadyRunning));
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_do_not_stop_workers() {
        let fetcher = Arc::new(ScriptedFetcher::failing());
        let (cache, scheduler) = setup(fetcher.clone(), passes(5));
        scheduler.initialize(manual_options(2));

        let outcome = scheduler.sync().await;
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                processed: 5,
                succeeded: 0,
                failed: 5
            }
        );
        assert_eq!(fetcher.calls(), 5);
        assert!(cache.is_empty());
        assert_eq!(scheduler.stats().errors, 5);
    }

    #[tokio::test]
    async fn test_counters_reset_each_sync() {
        let fetcher = Arc::new(ScriptedFetcher::failing());
        let (_, scheduler) = setup(fetcher.clone(), passes(3));
        scheduler.initialize(manual_options(2));

        scheduler.sync().await;
        assert_eq!(scheduler.stats().errors, 3);

        fetcher.set_failing(false);
        scheduler.sync().await;
        let stats = scheduler.stats();
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.syncs_completed, 2);
    }

    #[tokio::test]
    async fn test_enqueue_while_idle_starts_processing() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({"temp": 6})));
        let (cache, scheduler) = setup(fetcher.clone(), Vec::new());
        scheduler.initialize(manual_options(2));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert!(scheduler.enqueue(Location::new("grand-ballon", "Grand Ballon", 47.9, 7.1)));
        assert_eq!(scheduler.state(), SchedulerState::Syncing);

        wait_until(|| !scheduler.is_syncing()).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(fetcher.calls(), 1);
        let key = CacheKey::current(47.9, 7.1).expect("valid coordinates");
        assert_eq!(cache.entry(&key).map(|e| e.payload), Some(json!({"temp": 6})));
    }

    #[tokio::test]
    async fn test_enqueue_during_sync_is_processed() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(json!({})).with_delay(Duration::from_millis(10)),
        );
        let (cache, scheduler) = setup(fetcher.clone(), passes(3));
        scheduler.initialize(manual_options(1));

        let background = scheduler.clone();
        let handle = tokio::spawn(async move { background.sync().await });
        wait_until(|| scheduler.is_syncing()).await;

        assert!(scheduler.enqueue(Location::new("extra", "Extra", -33.4, -70.6)));
        handle.await.expect("sync task");
        wait_until(|| !scheduler.is_syncing()).await;

        assert_eq!(fetcher.calls(), 4);
        assert!(cache.entry(&CacheKey::current(-33.4, -70.6).expect("valid")).is_some());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_invalid_location() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (_, scheduler) = setup(fetcher.clone(), Vec::new());
        scheduler.initialize(manual_options(2));

        let missing = Location {
            id: "nowhere".to_string(),
            name: String::new(),
            lat: Some(47.0),
            lng: None,
            priority: None,
        };
        assert!(!scheduler.enqueue(missing));
        assert!(!scheduler.enqueue(Location::new("nan", "NaN", f64::NAN, 7.0)));
        assert_eq!(scheduler.queue_depth(), 0);
        assert!(!scheduler.is_syncing());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_fetch_finish() {
        let fetcher = Arc::new(
            ScriptedFetcher::returning(json!({"temp": 2})).with_delay(Duration::from_millis(50)),
        );
        let (cache, scheduler) = setup(fetcher.clone(), passes(5));
        scheduler.initialize(manual_options(1));

        let background = scheduler.clone();
        let handle = tokio::spawn(async move { background.sync().await });
        wait_until(|| fetcher.calls() == 1).await;

        scheduler.shutdown();
        assert_eq!(scheduler.queue_depth(), 0);
        let outcome = handle.await.expect("sync task");
        assert_eq!(
            outcome,
            SyncOutcome::Interrupted {
                processed: 1,
                succeeded: 1,
                failed: 0
            }
        );

        // The fetch that was running completed and was stored; nothing else ran
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        // A cut-short sync is not reported as completed
        let stats = scheduler.stats();
        assert_eq!(stats.syncs_completed, 0);
        assert!(stats.last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_refill_after_shutdown_leaves_queue_empty() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (_, scheduler) = setup(fetcher.clone(), passes(4));
        scheduler.initialize(manual_options(2));

        // A sync that passed its running check just before shutdown
        assert!(scheduler.inner.try_begin());
        scheduler.shutdown();
        assert_eq!(scheduler.inner.refill(), None);
        assert_eq!(scheduler.queue_depth(), 0);
        assert_eq!(scheduler.stats().queue_depth, 0);

        scheduler.inner.syncing.store(false, Ordering::Release);
        assert_eq!(scheduler.sync().await, SyncOutcome::Inactive);
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_refill_while_running_orders_candidates() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let mut candidates = passes(3);
        candidates.push(Location::new("bad", "Bad", 123.0, 7.0));
        let (_, scheduler) = setup(fetcher, candidates);

        assert_eq!(scheduler.inner.refill(), None);
        *lock(&scheduler.inner.lifecycle) = Lifecycle::Running;
        assert_eq!(scheduler.inner.refill(), Some(3));
        assert_eq!(scheduler.queue_depth(), 3);
    }

    #[tokio::test]
    async fn test_preload_on_start_runs_first_sync() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (cache, scheduler) = setup(fetcher.clone(), passes(3));
        scheduler.initialize(PrefetchOptions {
            preload_on_start: true,
            enable_sync: true,
            sync_interval_ms: 60 * 60 * 1000,
            concurrency: 2,
        });

        wait_until(|| scheduler.stats().syncs_completed >= 1).await;
        assert_eq!(cache.len(), 3);
        scheduler.shutdown();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_no_preload_waits_for_interval() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (_, scheduler) = setup(fetcher.clone(), passes(3));
        scheduler.initialize(PrefetchOptions {
            preload_on_start: false,
            enable_sync: true,
            sync_interval_ms: 60 * 60 * 1000,
            concurrency: 2,
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls(), 0);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_forecast_kind_warmed_when_requested() {
        let fetcher = Arc::new(ScriptedFetcher::returning(json!({})));
        let (cache, scheduler) = setup(fetcher.clone(), passes(2));
        let scheduler = scheduler.with_kinds(vec![DataKind::Current, DataKind::Forecast]);
        scheduler.initialize(manual_options(2));

        scheduler.sync().await;
        assert_eq!(fetcher.calls(), 4);
        assert_eq!(cache.len(), 4);
        assert!(cache.entry(&CacheKey::forecast(45.0, 7.0).expect("valid")).is_some());
    }
}
