//! Ingestion and query services over the shared event store.
//!
//! Both are cheap to clone (one `Arc`) and synchronous, like the store
//! itself. Handlers run them on a blocking thread.

use std::sync::Arc;

use fleetwatch_store::{EventStore, StoreError};
use fleetwatch_types::{IngestionResult, NodeStatus, StatusEvent, Summary};

/// Rejection reason for a blank `nodeName`.
pub const NODE_NAME_REQUIRED: &str = "nodeName is required.";

/// Rejection reason for a blank `eventType`.
pub const EVENT_TYPE_REQUIRED: &str = "eventType is required.";

/// Validates events and hands accepted ones to the store.
#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn EventStore>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Validates `event` and stores it if valid.
    ///
    /// `nodeName` is checked before `eventType`; a rejected event never
    /// reaches the store. An accepted event is added exactly once.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store fails to persist an accepted event.
    pub fn ingest(&self, event: StatusEvent) -> Result<IngestionResult, StoreError> {
        if event.node_name.trim().is_empty() {
            tracing::warn!(event_type = %event.event_type, "rejected event without node name");
            return Ok(IngestionResult::rejected(NODE_NAME_REQUIRED));
        }
        if event.event_type.trim().is_empty() {
            tracing::warn!(node = %event.node_name, "rejected event without event type");
            return Ok(IngestionResult::rejected(EVENT_TYPE_REQUIRED));
        }

        let node = event.node_name.clone();
        let event_type = event.event_type.clone();
        self.store.add(event)?;

        tracing::debug!(node = %node, event_type = %event_type, "accepted event");
        Ok(IngestionResult::accepted())
    }
}

/// Read-only views over the store.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn EventStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Live fleet summary.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn summary(&self) -> Result<Summary, StoreError> {
        self.store.summary()
    }

    /// Latest status of every node, most recently seen first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn nodes(&self) -> Result<Vec<NodeStatus>, StoreError> {
        self.store.node_statuses()
    }

    /// Up to `take` events of `node_name`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn node_events(&self, node_name: &str, take: i64) -> Result<Vec<StatusEvent>, StoreError> {
        self.store.node_events(node_name, take)
    }
}
