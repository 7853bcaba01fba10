use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;
use tracing::{debug, info, warn};

use super::coalesce::{Coalescer, Registration};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheOptions;
use crate::fetch::WeatherFetcher;
use crate::models::{CacheEntry, CacheKey, Lookup};
use crate::stats::{CacheCounters, CacheStats};
use crate::store::{EntryStore, StoreError};

/// Reason attached to placeholder payloads.
const PLACEHOLDER_REASON: &str = "weather data unavailable";

type EntryMap = HashMap<CacheKey, CacheEntry>;

/// In-memory weather cache with write-through persistence.
///
/// The entry map is guarded by a mutex that is never held across an `.await`
/// or a durable write; upstream fetches and store I/O run without it.
pub struct WeatherCache {
    entries: Mutex<EntryMap>,
    store: EntryStore,
    clock: Arc<dyn Clock>,
    soft_ttl: Duration,
    hard_ttl: Duration,
    coalescer: Coalescer,
    counters: CacheCounters,
    /// Serializes durable writes so snapshots land in the order they were taken.
    persist_lock: Mutex<()>,
}

/// Serialized entry map, taken while the entry lock is held.
struct Snapshot {
    raw: Result<String, StoreError>,
    count: usize,
}

impl Snapshot {
    fn of(entries: &EntryMap) -> Self {
        Self {
            raw: EntryStore::serialize(entries),
            count: entries.len(),
        }
    }
}

impl WeatherCache {
    /// Create a cache hydrated from `store`.
    pub fn new(options: &CacheOptions, store: EntryStore) -> Self {
        Self::with_clock(options, store, Arc::new(SystemClock))
    }

    pub fn with_clock(options: &CacheOptions, store: EntryStore, clock: Arc<dyn Clock>) -> Self {
        let entries = store.load();
        info!(count = entries.len(), "Weather cache hydrated");
        Self {
            entries: Mutex::new(entries),
            store,
            clock,
            soft_ttl: options.soft_ttl(),
            hard_ttl: options.hard_ttl(),
            coalescer: Coalescer::new(),
            counters: CacheCounters::default(),
            persist_lock: Mutex::new(()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, EntryMap> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Best available data for `key`.
    ///
    /// Never fails: a fresh entry is returned as-is, otherwise `fetcher` is
    /// called and its result stored. If the fetch fails the previous entry is
    /// served, or a placeholder when there is none.
    pub async fn get(&self, key: CacheKey, fetcher: &dyn WeatherFetcher) -> Lookup {
        if let Some(lookup) = self.fresh_lookup(&key) {
            CacheCounters::record(&self.counters.hits);
            return lookup;
        }

        match self.coalescer.register(key) {
            Registration::Leader(in_flight) => {
                // Another leader may have finished between the check and registration
                if let Some(lookup) = self.fresh_lookup(&key) {
                    CacheCounters::record(&self.counters.hits);
                    in_flight.complete(&lookup);
                    return lookup;
                }
                let lookup = self.refresh(key, fetcher).await;
                in_flight.complete(&lookup);
                lookup
            }
            Registration::Follower(mut rx) => match rx.recv().await {
                Ok(lookup) => {
                    CacheCounters::record(&self.counters.coalesced);
                    lookup
                }
                Err(e) => {
                    debug!(%key, error = %e, "In-flight refresh abandoned, fetching directly");
                    self.refresh(key, fetcher).await
                }
            },
        }
    }

    fn fresh_lookup(&self, key: &CacheKey) -> Option<Lookup> {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.soft_ttl))
            .map(Lookup::cached)
    }

    async fn refresh(&self, key: CacheKey, fetcher: &dyn WeatherFetcher) -> Lookup {
        match fetcher.fetch(key.kind(), key.lat(), key.lng()).await {
            Ok(payload) => {
                CacheCounters::record(&self.counters.successes);
                let entry = CacheEntry::new(key, payload, self.clock.now());
                let lookup = Lookup::fetched(&entry);
                self.store_entry(entry);
                debug!(%key, "Weather refreshed");
                lookup
            }
            Err(e) => {
                CacheCounters::record(&self.counters.errors);
                let previous = self.entries().get(&key).cloned();
                match previous {
                    Some(entry) => {
                        CacheCounters::record(&self.counters.stale_served);
                        warn!(
                            %key,
                            error = %e,
                            age = %entry.age_display(self.clock.now()),
                            "Weather refresh failed, serving stale entry"
                        );
                        Lookup::stale(&entry)
                    }
                    None => {
                        CacheCounters::record(&self.counters.placeholders);
                        warn!(%key, error = %e, "Weather refresh failed with nothing cached, serving placeholder");
                        Lookup::placeholder(PLACEHOLDER_REASON)
                    }
                }
            }
        }
    }

    fn persist_guard(&self) -> MutexGuard<'_, ()> {
        self.persist_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert unless a newer entry already landed, then persist.
    fn store_entry(&self, entry: CacheEntry) {
        let _persisting = self.persist_guard();
        let snapshot = {
            let mut entries = self.entries();
            let is_newer = entries
                .get(&entry.key)
                .map_or(true, |existing| existing.fetched_at <= entry.fetched_at);
            if !is_newer {
                return;
            }
            entries.insert(entry.key, entry);
            Snapshot::of(&entries)
        };
        self.persist(snapshot);
    }

    /// Write a snapshot taken under the entry lock. The caller holds the
    /// persist lock, not the entry lock, so lookups keep going during I/O.
    fn persist(&self, snapshot: Snapshot) {
        let count = snapshot.count;
        if let Err(e) = snapshot.raw.and_then(|raw| self.store.write_serialized(&raw)) {
            CacheCounters::record(&self.counters.persist_failures);
            warn!(error = %e, count, "Failed to persist weather cache");
        }
    }

    /// Drop every entry older than the hard TTL. Returns how many were removed.
    ///
    /// Persists only when something was removed, so back-to-back calls are a
    /// no-op.
    pub fn purge_expired(&self) -> usize {
        let _persisting = self.persist_guard();
        let now = self.clock.now();
        let (removed, snapshot) = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now, self.hard_ttl));
            let removed = before - entries.len();
            (removed, (removed > 0).then(|| Snapshot::of(&entries)))
        };

        match snapshot {
            Some(snapshot) => {
                info!(removed, remaining = snapshot.count, "Purged expired weather entries");
                self.persist(snapshot);
            }
            None => debug!("No expired weather entries to purge"),
        }
        removed
    }

    /// Wipe all entries, in memory and in the durable store.
    pub fn clear(&self) {
        let _persisting = self.persist_guard();
        let count = {
            let mut entries = self.entries();
            let count = entries.len();
            entries.clear();
            count
        };
        if let Err(e) = self.store.clear() {
            CacheCounters::record(&self.counters.persist_failures);
            warn!(error = %e, "Failed to clear persisted weather cache");
        }
        info!(count, "Weather cache cleared");
    }

    /// Copy of the entry for `key`, regardless of age.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering::Relaxed;

        let now = self.clock.now();
        let entries = self.entries();
        let fresh_entries = entries
            .values()
            .filter(|entry| entry.is_fresh(now, self.soft_ttl))
            .count();
        let purgeable_entries = entries
            .values()
            .filter(|entry| entry.is_expired(now, self.hard_ttl))
            .count();
        let oldest_entry_age_minutes = entries
            .values()
            .map(|entry| entry.age_minutes(now))
            .max();

        CacheStats {
            total_entries: entries.len(),
            fresh_entries,
            expired_entries: entries.len() - fresh_entries,
            purgeable_entries,
            oldest_entry_age_minutes,
            hits: self.counters.hits.load(Relaxed),
            successes: self.counters.successes.load(Relaxed),
            errors: self.counters.errors.load(Relaxed),
            stale_served: self.counters.stale_served.load(Relaxed),
            placeholders: self.counters.placeholders.load(Relaxed),
            coalesced: self.counters.coalesced.load(Relaxed),
            persist_failures: self.counters.persist_failures.load(Relaxed),
        }
    }
}
