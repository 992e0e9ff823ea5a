//! Status event storage for Fleetwatch.
//!
//! Every backend implements the [`EventStore`] contract: append one event,
//! read the latest status per node, read one node's history newest-first,
//! and compute a live fleet [`Summary`](fleetwatch_types::Summary). Backends
//! differ only in persistence and capacity policy; the read operations
//! behave identically.
//!
//! # Backends
//!
//! | Backend | Persistence | Growth bound |
//! |---------|-------------|--------------|
//! | [`MemoryEventStore`] | process lifetime | `max_events_per_node` per node + retention |
//! | [`SqliteEventStore`] | SQLite file | retention |
//!
//! Both prune expired events inline on access, so no read ever returns an
//! event older than the retention window. [`EventStore::prune_expired`] is
//! exposed for an optional periodic sweep.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fleetwatch_store::{open_store, BackendOptions, MemoryStoreOptions};
//!
//! let store = open_store(BackendOptions::InMemory(MemoryStoreOptions::default()))?;
//! store.add(event)?;
//! let summary = store.summary()?;
//! ```

mod error;
mod memory;
mod options;
mod sqlite;
mod store;

pub use error::StoreError;
pub use memory::MemoryEventStore;
pub use options::{BackendOptions, MemoryStoreOptions, RetentionPolicy, SqliteStoreOptions};
pub use sqlite::SqliteEventStore;
pub use store::{open_store, EventStore};

#[cfg(test)]
mod tests;
