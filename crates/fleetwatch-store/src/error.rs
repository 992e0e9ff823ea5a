//! Error types for the event store.

/// Errors that can occur during event store operations.
///
/// Only the SQLite backend produces these; the in-memory backend never
/// fails.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database statement failed.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection became available.
    #[error("store connection error: {0}")]
    Connection(#[from] r2d2::Error),

    /// The connection pool could not be created.
    #[error("store pool error: {0}")]
    Pool(#[from] fleetwatch_db::PoolError),

    /// The event table could not be created or upgraded.
    #[error("store schema error: {0}")]
    Schema(#[from] fleetwatch_db::MigrationError),
}
