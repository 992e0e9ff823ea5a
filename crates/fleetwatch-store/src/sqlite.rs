//! Durable event store backed by a single SQLite table.
//!
//! Rows are append-only. The `id` surrogate key breaks timestamp ties and is
//! never exposed. Timestamps are stored as fixed-width RFC 3339 UTC text
//! with nanosecond precision, so text comparison in SQL equals
//! chronological comparison.
//!
//! The table name comes from configuration; it is sanitised once at
//! construction and the statements are rendered then. Every value is a
//! bound parameter.

use chrono::{DateTime, SecondsFormat, Utc};
use fleetwatch_db::{create_pool, ensure_event_schema, sanitize_identifier, DbPool};
use fleetwatch_types::{
    clamp_take, NodeStatus, StatusEvent, StoreProvider, Summary, STATUS_ALERT, STATUS_FAILED,
};
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;
use crate::options::{RetentionPolicy, SqliteStoreOptions};
use crate::store::EventStore;

/// Formats a timestamp for storage and comparison.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// SQL text rendered against the sanitised table name.
#[derive(Debug)]
struct Statements {
    insert: String,
    prune: String,
    node_statuses: String,
    node_events: String,
    summary: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            insert: format!(
                r#"INSERT INTO "{table}"
                    (timestamp, machine, user_name, fleet, node_name, event_type, module, status, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#
            ),
            prune: format!(r#"DELETE FROM "{table}" WHERE timestamp < ?1"#),
            node_statuses: format!(
                r#"WITH ranked AS (
                    SELECT id, node_name, machine, fleet, status, event_type, module, timestamp, message,
                           ROW_NUMBER() OVER (
                               PARTITION BY node_name ORDER BY timestamp DESC, id DESC
                           ) AS rn
                    FROM "{table}"
                    WHERE timestamp >= ?1
                 )
                 SELECT node_name, machine, fleet, status, event_type, module, timestamp, message
                 FROM ranked
                 WHERE rn = 1
                 ORDER BY timestamp DESC, id DESC"#
            ),
            node_events: format!(
                r#"SELECT timestamp, machine, user_name, fleet, node_name, event_type, module, status, message
                 FROM "{table}"
                 WHERE node_name = ?1 AND timestamp >= ?2
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?3"#
            ),
            summary: format!(
                r#"WITH latest AS (
                    SELECT timestamp,
                           ROW_NUMBER() OVER (
                               PARTITION BY node_name ORDER BY timestamp DESC, id DESC
                           ) AS rn
                    FROM "{table}"
                    WHERE timestamp >= ?1
                 )
                 SELECT
                    (SELECT COUNT(*) FROM latest WHERE rn = 1),
                    (SELECT COUNT(*) FROM latest WHERE rn = 1 AND timestamp >= ?2),
                    (SELECT COUNT(*) FROM "{table}"
                        WHERE timestamp >= ?1 AND timestamp >= ?3 AND status = ?4),
                    (SELECT COUNT(*) FROM "{table}"
                        WHERE timestamp >= ?1 AND timestamp >= ?3 AND status = ?5)"#
            ),
        }
    }
}

/// SQLite-backed [`EventStore`].
///
/// Each call checks out its own pooled connection, so concurrent callers
/// never wait on an in-process lock while SQLite does I/O.
pub struct SqliteEventStore {
    pool: DbPool,
    table: String,
    retention: RetentionPolicy,
    sql: Statements,
}

impl SqliteEventStore {
    /// Creates a pool for `options.path` and opens the store on it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the pool cannot be created or the schema
    /// cannot be applied.
    pub fn open(options: &SqliteStoreOptions) -> Result<Self, StoreError> {
        let pool = create_pool(&options.path, options.runtime)?;
        Self::with_pool(pool, options)
    }

    /// Opens the store on an existing pool.
    ///
    /// `options.path` and `options.runtime` are ignored. When
    /// `auto_create_schema` is false and the table is missing, this still
    /// succeeds; every later call fails with `StoreError::Database`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the schema cannot be applied.
    pub fn with_pool(pool: DbPool, options: &SqliteStoreOptions) -> Result<Self, StoreError> {
        let table = sanitize_identifier(&options.table_name);
        if table != options.table_name {
            tracing::warn!(
                configured = %options.table_name,
                using = %table,
                "event table name contained disallowed characters"
            );
        }

        if options.auto_create_schema {
            let conn = pool.get()?;
            let applied = ensure_event_schema(&conn, &table)?;
            if applied > 0 {
                tracing::info!(table = %table, count = applied, "applied event table migrations");
            }
        }

        Ok(Self {
            pool,
            sql: Statements::for_table(&table),
            table,
            retention: options.retention,
        })
    }

    /// The sanitised table name in use.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn prune_with(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = encode_timestamp(self.retention.retention_cutoff(now));
        let removed = conn.execute(&self.sql.prune, params![cutoff])?;
        if removed > 0 {
            tracing::debug!(table = %self.table, removed, "pruned expired events");
        }
        Ok(removed)
    }
}

impl EventStore for SqliteEventStore {
    fn provider(&self) -> StoreProvider {
        StoreProvider::Sqlite
    }

    fn add(&self, event: StatusEvent) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            &self.sql.insert,
            params![
                encode_timestamp(event.timestamp),
                event.machine,
                event.user,
                event.fleet,
                event.node_name,
                event.event_type,
                event.module,
                event.status,
                event.message,
            ],
        )?;

        self.prune_with(&conn, Utc::now())?;
        Ok(())
    }

    fn node_statuses(&self) -> Result<Vec<NodeStatus>, StoreError> {
        let cutoff = encode_timestamp(self.retention.retention_cutoff(Utc::now()));
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&self.sql.node_statuses)?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok(NodeStatus {
                node_name: row.get(0)?,
                machine: row.get(1)?,
                fleet: row.get(2)?,
                last_status: row.get(3)?,
                last_event_type: row.get(4)?,
                last_module: row.get(5)?,
                last_seen: decode_timestamp(row, 6)?,
                last_message: row.get(7)?,
            })
        })?;

        let mut statuses = Vec::new();
        for row in rows {
            statuses.push(row?);
        }
        Ok(statuses)
    }

    fn node_events(&self, node_name: &str, take: i64) -> Result<Vec<StatusEvent>, StoreError> {
        let cutoff = encode_timestamp(self.retention.retention_cutoff(Utc::now()));
        let limit = clamp_take(take) as i64;

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&self.sql.node_events)?;
        let rows = stmt.query_map(params![node_name, cutoff, limit], |row| {
            Ok(StatusEvent {
                timestamp: decode_timestamp(row, 0)?,
                machine: row.get(1)?,
                user: row.get(2)?,
                fleet: row.get(3)?,
                node_name: row.get(4)?,
                event_type: row.get(5)?,
                module: row.get(6)?,
                status: row.get(7)?,
                message: row.get(8)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn summary(&self) -> Result<Summary, StoreError> {
        let now = Utc::now();
        let retention_cutoff = encode_timestamp(self.retention.retention_cutoff(now));
        let active_cutoff = encode_timestamp(self.retention.active_cutoff(now));
        let hour_cutoff = encode_timestamp(self.retention.hour_cutoff(now));

        let conn = self.pool.get()?;
        let (total, active, alerts, failures): (i64, i64, i64, i64) = conn.query_row(
            &self.sql.summary,
            params![
                retention_cutoff,
                active_cutoff,
                hour_cutoff,
                STATUS_ALERT,
                STATUS_FAILED
            ],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(Summary {
            total_nodes: total as u64,
            active_nodes: active as u64,
            alerts_last_hour: alerts as u64,
            failures_last_hour: failures as u64,
            generated_at: Utc::now(),
        })
    }

    fn prune_expired(&self) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        self.prune_with(&conn, Utc::now())
    }
}
