//! Freshness-aware weather cache.
//!
//! Entries younger than the soft TTL (1 hour by default) are served without
//! I/O. Older entries trigger a refresh; if that fails, the old entry is served
//! anyway (stale-serve), and if there is no entry at all a synthetic
//! placeholder is returned. Entries older than the hard TTL (24 hours) are
//! dropped by the periodic purge.
//!
//! Concurrent misses on the same key share one upstream fetch (see
//! [`coalesce`]).

pub mod coalesce;
pub mod freshness;

pub use coalesce::Coalescer;
pub use freshness::WeatherCache;
