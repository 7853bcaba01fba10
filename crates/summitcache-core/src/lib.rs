//! Core library for summitcache.
//!
//! Keeps weather data for mountain passes and other points of interest warm
//! for a dashboard client:
//!
//! - `cache`: freshness-aware in-memory cache with stale-serve fallback
//! - `store`: durable write-through persistence of cache entries
//! - `prefetch`: bounded-concurrency background scheduler that warms locations
//! - `fetch`: the `WeatherFetcher` seam and an HTTP implementation
//! - `service`: the `WeatherService` that ties the pieces together
//!
//! Nothing in this crate surfaces a failure to its callers on the read path.
//! Upstream and persistence errors are logged, counted, and resolved to the
//! best data available.

pub mod cache;
pub mod clock;
pub mod config;
pub mod fetch;
pub mod models;
pub mod prefetch;
pub mod service;
pub mod stats;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use cache::WeatherCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheOptions, Config, PrefetchOptions};
pub use fetch::{FetchError, OpenMeteoFetcher, WeatherFetcher};
pub use models::{CacheEntry, CacheKey, DataKind, Location, Lookup, Origin};
pub use prefetch::{PrefetchScheduler, SchedulerState, SyncOutcome};
pub use service::WeatherService;
pub use stats::{CacheStats, SchedulerStats, ServiceStats};
pub use store::{EntryStore, FileStore, KeyValueStore, MemoryStore, StoreError};
