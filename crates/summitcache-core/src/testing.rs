//! Test doubles shared across module tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::clock::ManualClock;
use crate::fetch::{FetchError, WeatherFetcher};
use crate::models::{CacheEntry, CacheKey, DataKind};
use crate::store::{EntryStore, KeyValueStore, MemoryStore, StoreError, STORE_KEY};

/// Fetcher that counts calls and peak concurrency, and can be told to fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
    payload: Option<Value>,
    pub seen: Mutex<Vec<(DataKind, f64, f64)>>,
}

impl ScriptedFetcher {
    pub fn returning(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        let fetcher = Self::default();
        fetcher.set_failing(true);
        fetcher
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherFetcher for ScriptedFetcher {
    async fn fetch(&self, kind: DataKind, lat: f64, lng: f64) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((kind, lat, lng));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Other("upstream down".to_string()));
        }
        Ok(self
            .payload
            .clone()
            .unwrap_or_else(|| json!({"lat": lat, "lng": lng, "kind": kind})))
    }
}

pub fn key(lat: f64, lng: f64) -> CacheKey {
    CacheKey::current(lat, lng).expect("valid coordinates")
}

/// A memory-backed entry store pre-filled with entries aged relative to `now`.
pub fn seeded_store(
    now: DateTime<Utc>,
    entries: &[(CacheKey, Value, chrono::Duration)],
) -> (Arc<MemoryStore>, EntryStore) {
    let backend = Arc::new(MemoryStore::new());
    let store = EntryStore::new(backend.clone());
    let map = entries
        .iter()
        .map(|(key, payload, age)| (*key, CacheEntry::new(*key, payload.clone(), now - *age)))
        .collect();
    store.save(&map).expect("seed store");
    (backend, store)
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::default())
}

/// Store whose writes block until `open` is called. Reads never block.
#[derive(Default)]
pub struct GatedStore {
    inner: MemoryStore,
    open: Mutex<bool>,
    opened: Condvar,
    writing: AtomicBool,
}

impl GatedStore {
    /// Pre-fill with entries aged relative to `now`, bypassing the gate.
    pub fn seed(&self, now: DateTime<Utc>, entries: &[(CacheKey, Value, chrono::Duration)]) {
        let map = entries
            .iter()
            .map(|(key, payload, age)| (*key, CacheEntry::new(*key, payload.clone(), now - *age)))
            .collect();
        let raw = EntryStore::serialize(&map).expect("serialize seed");
        self.inner.write(STORE_KEY, &raw).expect("seed store");
    }

    pub fn open(&self) {
        *self.open.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.opened.notify_all();
    }

    /// True once a write is waiting on (or has passed) the gate.
    pub fn writing(&self) -> bool {
        self.writing.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for GatedStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writing.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = self.opened.wait(open).unwrap_or_else(|e| e.into_inner());
        }
        drop(open);
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}
