use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KeyValueStore, StoreError};
use crate::models::{CacheEntry, CacheKey};

/// Key under which the entry map lives in the host store.
pub const STORE_KEY: &str = "summitcache.weather-cache";

/// Bumped when the serialized layout changes incompatibly.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Persisted {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Loads and saves the full entry map as one blob.
#[derive(Clone)]
pub struct EntryStore {
    backend: Arc<dyn KeyValueStore>,
}

impl EntryStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Read the persisted map.
    ///
    /// Missing, unreadable, or unparseable data yields an empty map; the
    /// failure is logged and never reaches the caller.
    pub fn load(&self) -> HashMap<CacheKey, CacheEntry> {
        match self.try_load() {
            Ok(entries) => {
                debug!(count = entries.len(), "Loaded persisted weather entries");
                entries
            }
            Err(e) => {
                warn!(error = %e, store_key = STORE_KEY, "Failed to load persisted weather cache, starting empty");
                HashMap::new()
            }
        }
    }

    pub fn try_load(&self) -> Result<HashMap<CacheKey, CacheEntry>, StoreError> {
        let Some(raw) = self.backend.read(STORE_KEY)? else {
            return Ok(HashMap::new());
        };
        Self::deserialize(&raw)
    }

    /// Write the full map back (write-through).
    pub fn save(&self, entries: &HashMap<CacheKey, CacheEntry>) -> Result<(), StoreError> {
        let raw = Self::serialize(entries)?;
        self.write_serialized(&raw)
    }

    /// Write a blob produced by [`EntryStore::serialize`].
    pub fn write_serialized(&self, raw: &str) -> Result<(), StoreError> {
        self.backend.write(STORE_KEY, raw)
    }

    /// Drop the persisted blob entirely.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(STORE_KEY)
    }

    /// Serialized form, ordered by key so identical maps produce identical text.
    pub fn serialize(entries: &HashMap<CacheKey, CacheEntry>) -> Result<String, StoreError> {
        let mut sorted: Vec<CacheEntry> = entries.values().cloned().collect();
        sorted.sort_by_key(|entry| entry.key);
        let persisted = Persisted {
            version: FORMAT_VERSION,
            entries: sorted,
        };
        Ok(serde_json::to_string(&persisted)?)
    }

    pub fn deserialize(raw: &str) -> Result<HashMap<CacheKey, CacheEntry>, StoreError> {
        let persisted: Persisted = serde_json::from_str(raw)?;
        if persisted.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(persisted.version));
        }
        Ok(persisted
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry))
            .collect())
    }
}
