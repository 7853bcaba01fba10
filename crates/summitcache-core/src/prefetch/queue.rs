use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Location;

/// FIFO of locations waiting to be warmed, shared by all workers.
#[derive(Default)]
pub struct PrefetchQueue {
    items: Mutex<VecDeque<Location>>,
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<Location>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the remaining contents with `batch`.
    pub fn replace(&self, batch: Vec<Location>) {
        *self.items() = batch.into();
    }

    pub fn push(&self, location: Location) {
        self.items().push_back(location);
    }

    pub fn pop(&self) -> Option<Location> {
        self.items().pop_front()
    }

    pub fn clear(&self) {
        self.items().clear();
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// Order one sync's worth of candidates.
///
/// Drops locations without usable coordinates, shuffles so the same head of
/// the list is not always warmed first, then stable-sorts by descending
/// priority. Locations without a priority count as 0, so ordering among equal
/// priorities stays random.
pub fn order_batch<R: Rng + ?Sized>(candidates: &[Location], rng: &mut R) -> Vec<Location> {
    let mut batch: Vec<Location> = candidates
        .iter()
        .filter(|location| location.is_valid())
        .cloned()
        .collect();
    batch.shuffle(rng);
    batch.sort_by_key(|location| Reverse(location.priority.unwrap_or(0)));
    batch
}
