//! Counters and read-only snapshots for observability.
//!
//! Counters are plain atomics updated on the hot path; `snapshot()` copies
//! them out. Snapshots serialize with camelCase names so a web client can
//! show a "data may be outdated" hint straight from them.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prefetch::SchedulerState;

/// Lookup outcomes recorded by the cache.
#[derive(Debug, Default)]
pub struct CacheCounters {
    /// Served from a fresh entry without I/O.
    pub hits: AtomicU64,
    /// Upstream fetches that succeeded.
    pub successes: AtomicU64,
    /// Upstream fetches that failed.
    pub errors: AtomicU64,
    /// Failed refreshes answered with the previous entry.
    pub stale_served: AtomicU64,
    /// Failed refreshes answered with the synthetic default.
    pub placeholders: AtomicU64,
    /// Lookups that waited on another caller's in-flight fetch.
    pub coalesced: AtomicU64,
    /// Writes to the durable store that failed.
    pub persist_failures: AtomicU64,
}

impl CacheCounters {
    pub fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    /// Younger than the soft TTL.
    pub fresh_entries: usize,
    /// At or past the soft TTL (still usable as a fallback).
    pub expired_entries: usize,
    /// Past the hard TTL, due for removal on the next purge.
    pub purgeable_entries: usize,
    pub oldest_entry_age_minutes: Option<i64>,
    pub hits: u64,
    pub successes: u64,
    pub errors: u64,
    pub stale_served: u64,
    pub placeholders: u64,
    pub coalesced: u64,
    pub persist_failures: u64,
}

/// Prefetch outcomes, reset at the start of each scheduled sync.
#[derive(Debug, Default)]
pub struct PrefetchCounters {
    pub successes: AtomicU64,
    pub errors: AtomicU64,
    pub syncs_completed: AtomicU64,
}

impl PrefetchCounters {
    /// Zero the per-sync counters.
    pub fn begin_sync(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_sync(&self) {
        self.syncs_completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub state: SchedulerState,
    pub queue_depth: usize,
    pub is_syncing: bool,
    /// Since the last scheduled sync started.
    pub successes: u64,
    /// Since the last scheduled sync started.
    pub errors: u64,
    pub syncs_completed: u64,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Combined view exposed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub queue_depth: usize,
    pub hit_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub oldest_entry_age_minutes: Option<i64>,
    pub is_syncing: bool,
    pub cache: CacheStats,
    pub scheduler: SchedulerStats,
}

impl ServiceStats {
    pub fn new(cache: CacheStats, scheduler: SchedulerStats) -> Self {
        Self {
            queue_depth: scheduler.queue_depth,
            hit_count: cache.hits,
            success_count: cache.successes,
            error_count: cache.errors,
            oldest_entry_age_minutes: cache.oldest_entry_age_minutes,
            is_syncing: scheduler.is_syncing,
            cache,
            scheduler,
        }
    }

    /// True when a collaborator should flag the data as possibly outdated.
    pub fn may_be_outdated(&self) -> bool {
        self.cache.expired_entries > 0 || self.cache.stale_served > 0 || self.cache.placeholders > 0
    }
}
