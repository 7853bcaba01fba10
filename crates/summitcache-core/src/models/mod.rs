//! Data models for the weather cache.
//!
//! - `CacheKey`, `DataKind`: rounded coordinate keys, namespaced by data kind
//! - `CacheEntry`: last known-good payload for a key and when it was fetched
//! - `Location`: a prefetch candidate (mountain pass, trailhead, visited spot)
//! - `Lookup`, `Origin`: what `get` hands back and where it came from

pub mod entry;
pub mod key;
pub mod location;
pub mod payload;

pub use entry::CacheEntry;
pub use key::{CacheKey, DataKind, KeyParseError};
pub use location::{is_valid_coordinate, Location};
pub use payload::{placeholder_payload, Lookup, Origin};
