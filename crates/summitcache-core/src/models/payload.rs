//! The answer to a cache lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::entry::CacheEntry;

/// Where the payload of a [`Lookup`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// Served from an entry younger than the soft TTL, no I/O.
    Cached,
    /// Freshly fetched and stored.
    Fetched,
    /// Refresh failed; the previous entry was served instead.
    Stale,
    /// Refresh failed and nothing was cached; synthetic default payload.
    Placeholder,
}

/// Payload plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lookup {
    pub payload: Value,
    pub origin: Origin,
    /// When the payload was fetched from upstream. `None` for placeholders.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Lookup {
    pub fn cached(entry: &CacheEntry) -> Self {
        Self::from_entry(entry, Origin::Cached)
    }

    pub fn fetched(entry: &CacheEntry) -> Self {
        Self::from_entry(entry, Origin::Fetched)
    }

    pub fn stale(entry: &CacheEntry) -> Self {
        Self::from_entry(entry, Origin::Stale)
    }

    pub fn placeholder(reason: &str) -> Self {
        Self {
            payload: placeholder_payload(reason),
            origin: Origin::Placeholder,
            fetched_at: None,
        }
    }

    fn from_entry(entry: &CacheEntry, origin: Origin) -> Self {
        Self {
            payload: entry.payload.clone(),
            origin,
            fetched_at: Some(entry.fetched_at),
        }
    }

    /// True when the payload reflects a fetch within the soft TTL.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.origin, Origin::Cached | Origin::Fetched)
    }
}

/// Synthetic payload returned when no real data is available.
///
/// Always carries `"placeholder": true` so renderers can tell it apart from
/// upstream data.
pub fn placeholder_payload(reason: &str) -> Value {
    json!({
        "placeholder": true,
        "reason": reason,
        "current": null,
        "daily": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CacheKey;

    #[test]
    fn test_placeholder_is_marked() {
        let lookup = Lookup::placeholder("upstream unavailable");
        assert_eq!(lookup.origin, Origin::Placeholder);
        assert!(!lookup.is_authoritative());
        assert_eq!(lookup.payload["placeholder"], Value::Bool(true));
        assert_eq!(lookup.payload["reason"], "upstream unavailable");
        assert!(lookup.fetched_at.is_none());
    }

    #[test]
    fn test_lookup_from_entry() {
        let key = CacheKey::current(48.07, 7.0).expect("valid coordinates");
        let entry = CacheEntry::new(key, json!({"temp": 12}), Utc::now());

        assert!(Lookup::cached(&entry).is_authoritative());
        assert!(Lookup::fetched(&entry).is_authoritative());

        let stale = Lookup::stale(&entry);
        assert!(!stale.is_authoritative());
        assert_eq!(stale.payload, json!({"temp": 12}));
        assert_eq!(stale.fetched_at, Some(entry.fetched_at));
    }
}
