//! Schema migrations for the status event table.
//!
//! The event table name is configurable, so each migration is a SQL
//! template with a `{table}` placeholder. Templates are rendered against a
//! sanitised identifier and tracked in `_fleetwatch_migrations` under the
//! key `<table>/<migration>`, so two stores sharing one database file with
//! different table names migrate independently. Each migration runs exactly
//! once per table.

use rusqlite::Connection;
use thiserror::Error;

use crate::identifier::sanitize_identifier;

/// A single templated migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All event table migrations in order. New migrations are appended here.
const EVENT_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_create_events",
        sql: r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                machine TEXT NOT NULL DEFAULT '',
                user_name TEXT NOT NULL DEFAULT '',
                fleet TEXT NOT NULL DEFAULT '',
                node_name TEXT NOT NULL COLLATE NOCASE,
                event_type TEXT NOT NULL,
                module TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT '',
                message TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS "ix_{table}_node_name_timestamp"
                ON "{table}" (node_name, timestamp DESC);
            CREATE INDEX IF NOT EXISTS "ix_{table}_timestamp"
                ON "{table}" (timestamp DESC);
        "#,
    },
    Migration {
        name: "001_status_index",
        sql: r#"
            CREATE INDEX IF NOT EXISTS "ix_{table}_status_timestamp"
                ON "{table}" (status, timestamp);
        "#,
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The tracking key of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Creates or upgrades the status event table named `table`.
///
/// The name is sanitised first; callers may pass raw configuration. Returns
/// the number of migrations applied by this call (zero when the table is
/// already current).
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// migration tracking table cannot be queried.
pub fn ensure_event_schema(conn: &Connection, table: &str) -> Result<usize, MigrationError> {
    let table = sanitize_identifier(table);
    run_migrations_from_list(conn, &table, EVENT_MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    table: &str,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _fleetwatch_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_fleetwatch_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let key = format!("{table}/{}", migration.name);

        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _fleetwatch_migrations WHERE name = ?1",
                [&key],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(migration = %key, "migration already applied, skipping");
            continue;
        }

        tracing::info!(migration = %key, "applying migration");

        let failed = |source| MigrationError::ExecutionFailed {
            name: key.clone(),
            source,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(&migration.sql.replace("{table}", table))
            .map_err(failed)?;
        tx.execute("INSERT INTO _fleetwatch_migrations (name) VALUES (?1)", [&key])
            .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
    }

    Ok(applied)
}
