//! The weather service: cache, durable store and prefetch scheduler wired
//! together behind one handle.
//!
//! Collaborators construct it once with the host's store and fetcher, call
//! `start` when the app comes up and `shutdown` when it goes away. Everything
//! in between is `get`, `enqueue` and `stats`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::WeatherCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, PrefetchOptions};
use crate::fetch::WeatherFetcher;
use crate::models::{CacheKey, DataKind, Location, Lookup};
use crate::prefetch::{PrefetchScheduler, SyncOutcome};
use crate::stats::{CacheStats, ServiceStats};
use crate::store::{EntryStore, KeyValueStore};

const INVALID_COORDINATES: &str = "invalid coordinates";

pub struct WeatherService {
    cache: Arc<WeatherCache>,
    fetcher: Arc<dyn WeatherFetcher>,
    scheduler: PrefetchScheduler,
    purge_interval: Duration,
    shutdown: CancellationToken,
    purge_timer: Mutex<Option<JoinHandle<()>>>,
}

impl WeatherService {
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>, fetcher: Arc<dyn WeatherFetcher>) -> Self {
        Self::with_clock(config, store, fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn WeatherFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(WeatherCache::with_clock(&config.cache, EntryStore::new(store), clock));
        let scheduler = PrefetchScheduler::new(
            cache.clone(),
            fetcher.clone(),
            config.candidates(),
            config.cache.inter_request_delay(),
        );
        Self {
            cache,
            fetcher,
            scheduler,
            purge_interval: config.cache.purge_interval(),
            shutdown: CancellationToken::new(),
            purge_timer: Mutex::new(None),
        }
    }

    /// Initialize the prefetch scheduler and start the purge timer.
    ///
    /// Returns `false` if the service was already started (or shut down).
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, options: PrefetchOptions) -> bool {
        if !self.scheduler.initialize(options) {
            return false;
        }

        let cache = self.cache.clone();
        let token = self.shutdown.clone();
        let period = self.purge_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Purge timer stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.purge_expired();
                    }
                }
            }
        });
        *self.purge_timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        info!(purge_interval_secs = period.as_secs(), "Weather service started");
        true
    }

    /// Best available data for a coordinate. Never fails.
    ///
    /// Coordinates outside the globe get a placeholder without touching the
    /// network.
    pub async fn get(&self, kind: DataKind, lat: f64, lng: f64) -> Lookup {
        match CacheKey::new(kind, lat, lng) {
            Some(key) => self.get_key(key).await,
            None => {
                warn!(lat, lng, %kind, "Weather requested for invalid coordinates");
                Lookup::placeholder(INVALID_COORDINATES)
            }
        }
    }

    pub async fn current(&self, lat: f64, lng: f64) -> Lookup {
        self.get(DataKind::Current, lat, lng).await
    }

    pub async fn forecast(&self, lat: f64, lng: f64) -> Lookup {
        self.get(DataKind::Forecast, lat, lng).await
    }

    pub async fn get_key(&self, key: CacheKey) -> Lookup {
        self.cache.get(key, self.fetcher.as_ref()).await
    }

    /// Queue a location for warming. See [`PrefetchScheduler::enqueue`].
    pub fn enqueue(&self, location: Location) -> bool {
        self.scheduler.enqueue(location)
    }

    pub async fn sync(&self) -> SyncOutcome {
        self.scheduler.sync().await
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Stop prefetching and the purge timer. In-flight fetches still complete.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.shutdown.cancel();
        if let Some(handle) = self.purge_timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats::new(self.cache.stats(), self.scheduler.stats())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &PrefetchScheduler {
        &self.scheduler
    }
}

impl Drop for WeatherService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
