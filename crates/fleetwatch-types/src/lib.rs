//! Shared types and constants for the Fleetwatch monitoring service.
//!
//! This crate holds the value types that cross every boundary in the
//! workspace: the [`StatusEvent`] pushed by remote agents, the derived
//! [`NodeStatus`] and [`Summary`] returned to operators, and the
//! [`IngestionResult`] returned to producers.
//!
//! Nothing here performs I/O. The store and server crates depend on these
//! definitions so that both storage backends and the HTTP layer agree on a
//! single wire shape (camelCase JSON, RFC 3339 UTC timestamps).

mod event;
mod summary;

pub use event::{IngestionResult, StatusEvent, STATUS_ALERT, STATUS_FAILED};
pub use summary::{NodeStatus, Summary};

use serde::{Deserialize, Serialize};

/// Default number of events returned by a node history query.
pub const DEFAULT_TAKE: i64 = 100;

/// Smallest page size a node history query may request.
pub const MIN_TAKE: i64 = 1;

/// Largest page size a node history query may request.
pub const MAX_TAKE: i64 = 1000;

/// Clamps a requested node history page size into `[MIN_TAKE, MAX_TAKE]`.
///
/// Both backends apply this to every `node_events` call, so a caller asking
/// for `0` or `-5` still receives at most one event and a caller asking for
/// a million receives at most a thousand.
pub fn clamp_take(take: i64) -> usize {
    take.clamp(MIN_TAKE, MAX_TAKE) as usize
}

/// Storage backends available to the service.
///
/// Selected once at startup from configuration and never switched at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    /// Bounded, expiring, process-local store. Nothing survives a restart.
    #[default]
    #[serde(alias = "memory", alias = "inmemory", alias = "InMemory")]
    InMemory,
    /// Durable store backed by a SQLite database file.
    #[serde(alias = "Sqlite", alias = "relational")]
    Sqlite,
}

impl StoreProvider {
    /// Returns the canonical string label for this provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InMemory => "in_memory",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreProvider {
    type Err = ParseStoreProviderError;

    /// Parses a provider label, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "sqlite" | "relational" => Ok(Self::Sqlite),
            _ => Err(ParseStoreProviderError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown store provider string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown store provider: {0}")]
pub struct ParseStoreProviderError(pub String);
