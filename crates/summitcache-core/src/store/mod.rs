//! Durable persistence for the weather cache.
//!
//! The host provides a simple string-keyed blob store (`KeyValueStore`). The
//! `EntryStore` serializes the whole entry map into a single blob under a fixed
//! key and writes it back after every mutation (write-through).
//!
//! Two backends ship with the crate:
//! - `FileStore`: one JSON file per key in a directory, written atomically
//! - `MemoryStore`: process-local map, for tests and ephemeral runs

pub mod backend;
pub mod entries;
pub mod error;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use entries::{EntryStore, STORE_KEY};
pub use error::StoreError;
