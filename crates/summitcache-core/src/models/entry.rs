use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::CacheKey;
use crate::utils::format_age;

/// Last known-good weather payload for one key.
///
/// Only ever replaced by a newer successful fetch; failed refreshes leave it
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, payload: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key,
            payload,
            fetched_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.age(now).num_minutes()
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        format_age(self.age_minutes(now))
    }

    /// Young enough to serve without a refresh attempt.
    pub fn is_fresh(&self, now: DateTime<Utc>, soft_ttl: Duration) -> bool {
        self.age(now) < soft_ttl
    }

    /// Old enough to be dropped by a purge, even as a fallback.
    pub fn is_expired(&self, now: DateTime<Utc>, hard_ttl: Duration) -> bool {
        self.age(now) > hard_ttl
    }
}
