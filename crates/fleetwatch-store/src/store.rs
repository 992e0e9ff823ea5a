//! The storage contract and backend selection.

use std::sync::Arc;

use fleetwatch_types::{NodeStatus, StatusEvent, StoreProvider, Summary};

use crate::error::StoreError;
use crate::memory::MemoryEventStore;
use crate::options::BackendOptions;
use crate::sqlite::SqliteEventStore;

/// Storage contract shared by every backend.
///
/// Methods are synchronous. Callers on an async runtime should run them on
/// a blocking thread, since the SQLite backend performs file I/O.
///
/// Every method prunes (or filters out) events older than the retention
/// window before answering.
pub trait EventStore: Send + Sync {
    /// Which backend this is.
    fn provider(&self) -> StoreProvider;

    /// Appends one event. Never rejects on semantic grounds; validation is
    /// the ingestion service's job.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot persist the event.
    fn add(&self, event: StatusEvent) -> Result<(), StoreError>;

    /// The latest event of every node, ordered by `last_seen` descending.
    ///
    /// "Latest" is the greatest timestamp; ties go to the event inserted
    /// later. Nodes are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    fn node_statuses(&self) -> Result<Vec<NodeStatus>, StoreError>;

    /// Up to `take` events of one node, newest first.
    ///
    /// `take` is clamped to `[1, 1000]`. An unknown node yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    fn node_events(&self, node_name: &str, take: i64) -> Result<Vec<StatusEvent>, StoreError>;

    /// A live fleet summary computed from current contents.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    fn summary(&self) -> Result<Summary, StoreError>;

    /// Removes every expired event and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    fn prune_expired(&self) -> Result<usize, StoreError>;
}

/// Opens the configured backend.
///
/// Called once at startup; the returned store is shared for the lifetime
/// of the process.
///
/// # Errors
///
/// Returns `StoreError` if the SQLite pool cannot be created or the schema
/// cannot be applied.
pub fn open_store(options: BackendOptions) -> Result<Arc<dyn EventStore>, StoreError> {
    let store: Arc<dyn EventStore> = match options {
        BackendOptions::InMemory(options) => Arc::new(MemoryEventStore::new(options)),
        BackendOptions::Sqlite(options) => Arc::new(SqliteEventStore::open(&options)?),
    };

    tracing::info!(provider = %store.provider(), "opened event store");
    Ok(store)
}
