//! Backend options and the retention windows shared by both backends.

use chrono::{DateTime, Duration, Utc};
use fleetwatch_db::{DbRuntimeSettings, DEFAULT_TABLE_NAME};

/// Time windows that bound what the store retains and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Events older than this many hours are pruned.
    pub retention_hours: u32,
    /// Nodes whose latest event is within this many minutes count as active.
    pub active_window_minutes: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            active_window_minutes: 10,
        }
    }
}

impl RetentionPolicy {
    /// Events strictly before this instant are expired.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(i64::from(self.retention_hours))
    }

    /// Nodes last seen at or after this instant are active.
    pub fn active_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(i64::from(self.active_window_minutes))
    }

    /// Start of the window used for the alert and failure counts.
    pub fn hour_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(1)
    }
}

/// Options for [`MemoryEventStore`](crate::MemoryEventStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreOptions {
    /// Retention and activity windows.
    pub retention: RetentionPolicy,
    /// Per-node capacity; the oldest events are evicted beyond it.
    /// Values below 1 are treated as 1.
    pub max_events_per_node: usize,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            max_events_per_node: 5_000,
        }
    }
}

/// Options for [`SqliteEventStore`](crate::SqliteEventStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreOptions {
    /// Retention and activity windows.
    pub retention: RetentionPolicy,
    /// Path to the SQLite database file.
    pub path: String,
    /// Event table name. Sanitised before use.
    pub table_name: String,
    /// Create or upgrade the event table when the store opens.
    pub auto_create_schema: bool,
    /// Pool and busy-timeout tunables.
    pub runtime: DbRuntimeSettings,
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            path: "fleetwatch.db".to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            auto_create_schema: true,
            runtime: DbRuntimeSettings::default(),
        }
    }
}

/// The backend to open, with its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOptions {
    /// Bounded in-process store.
    InMemory(MemoryStoreOptions),
    /// Durable SQLite store.
    Sqlite(SqliteStoreOptions),
}
