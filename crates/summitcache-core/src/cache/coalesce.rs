//! Single-flight refreshes per cache key.
//!
//! When several callers miss on the same key at once, only the first one calls
//! the upstream fetcher. The others subscribe to its result.
//!
//! ```text
//! get(A) ─┐
//! get(A) ─┼──► Coalescer ──► one fetch for A ──► result broadcast to all
//! get(A) ─┘
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{CacheKey, Lookup};

/// Typical fan-in for one key is a handful of concurrent callers.
const WAITER_CHANNEL_CAPACITY: usize = 16;

type InFlightMap = HashMap<CacheKey, broadcast::Sender<Lookup>>;

#[derive(Default)]
pub struct Coalescer {
    in_flight: Mutex<InFlightMap>,
}

/// Outcome of registering interest in a key.
pub enum Registration<'a> {
    /// Caller owns the refresh and must finish it through the guard.
    Leader(InFlight<'a>),
    /// Another caller is already refreshing; wait on this receiver.
    Follower(broadcast::Receiver<Lookup>),
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, InFlightMap> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, key: CacheKey) -> Registration<'_> {
        let mut in_flight = self.map();
        if let Some(tx) = in_flight.get(&key) {
            trace!(%key, "Joining in-flight refresh");
            return Registration::Follower(tx.subscribe());
        }

        let (tx, _rx) = broadcast::channel(WAITER_CHANNEL_CAPACITY);
        in_flight.insert(key, tx);
        Registration::Leader(InFlight {
            coalescer: self,
            key,
            done: false,
        })
    }

    /// Number of keys currently being refreshed.
    pub fn in_flight(&self) -> usize {
        self.map().len()
    }
}

/// Leader's handle on an in-flight refresh.
///
/// Dropping it without calling [`InFlight::complete`] (e.g. the leader's
/// future was cancelled) unregisters the key; followers then see the channel
/// close and refresh on their own.
pub struct InFlight<'a> {
    coalescer: &'a Coalescer,
    key: CacheKey,
    done: bool,
}

impl InFlight<'_> {
    pub fn complete(mut self, lookup: &Lookup) {
        self.done = true;
        if let Some(tx) = self.coalescer.map().remove(&self.key) {
            // No receivers is fine: nobody joined this refresh
            let _ = tx.send(lookup.clone());
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.coalescer.map().remove(&self.key);
        }
    }
}
