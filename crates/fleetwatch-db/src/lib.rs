//! Database layer for the Fleetwatch relational store.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! identifier sanitisation, and the schema migrations for the status event
//! table.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process is required, and
//!   WAL lets request handlers read while another connection inserts.
//! - **`r2d2` connection pool**: each store call checks out its own
//!   connection, so no in-process lock is held while SQLite does I/O.
//! - **Templated migrations**: the event table name comes from
//!   configuration, so migration SQL is rendered against a sanitised
//!   identifier and tracked per table.

mod identifier;
mod migrations;
mod pool;

pub use identifier::{sanitize_identifier, DEFAULT_TABLE_NAME};
pub use migrations::{ensure_event_schema, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
