//! Background prefetch of weather for a curated set of locations.
//!
//! The scheduler refills its queue from the candidate list on a fixed interval
//! (and once at startup when asked to), shuffles it, and drains it with a fixed
//! number of workers. Each worker warms one location at a time through the
//! regular cache path and pauses between requests, so the upstream request
//! rate is capped no matter how long the queue is.
//!
//! ```text
//!   timer / enqueue ──► PrefetchQueue ──► worker 1 ─┐
//!                                     └─► worker N ─┴──► WeatherCache::get
//! ```

pub mod queue;
pub mod scheduler;

pub use queue::{order_batch, PrefetchQueue};
pub use scheduler::{PrefetchScheduler, SchedulerState, SyncOutcome};
