//! Status event and ingestion result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `status` value counted as an alert in the summary.
///
/// Compared case-sensitively: `"Alert"` is not an alert.
pub const STATUS_ALERT: &str = "alert";

/// The `status` value counted as a failure in the summary.
///
/// Compared case-sensitively: `"FAILED"` is not a failure.
pub const STATUS_FAILED: &str = "failed";

/// One status record pushed by a remote agent.
///
/// Events are immutable once accepted. The timestamp is supplied by the
/// producer and stored as-is; the server never adjusts it. Every string
/// field defaults to empty when absent from the JSON body, so validation of
/// `node_name` and `event_type` happens in the ingestion service rather than
/// in the deserializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// When the transition happened, as reported by the producer.
    pub timestamp: DateTime<Utc>,
    /// Host machine name.
    #[serde(default)]
    pub machine: String,
    /// User account the agent runs under.
    #[serde(default)]
    pub user: String,
    /// Fleet or group the node belongs to.
    #[serde(default)]
    pub fleet: String,
    /// Node identifier; the partition key for storage and queries.
    #[serde(default)]
    pub node_name: String,
    /// Free-form event tag (e.g. `heartbeat`, `module_result`).
    #[serde(default)]
    pub event_type: String,
    /// Free-form subject of the event (e.g. a module name or `system`).
    #[serde(default)]
    pub module: String,
    /// Free-form status. See [`STATUS_ALERT`] and [`STATUS_FAILED`].
    #[serde(default)]
    pub status: String,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

impl StatusEvent {
    /// Returns `true` if this event counts towards `alertsLastHour`.
    pub fn is_alert(&self) -> bool {
        self.status == STATUS_ALERT
    }

    /// Returns `true` if this event counts towards `failuresLastHour`.
    pub fn is_failure(&self) -> bool {
        self.status == STATUS_FAILED
    }
}

/// Outcome of an ingestion attempt.
///
/// A rejection is a normal result, not an error: the transport maps
/// `accepted == false` to a client error and `accepted == true` to an
/// accepted status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    /// Whether the event was stored.
    pub accepted: bool,
    /// Human-readable explanation.
    pub message: String,
}

impl IngestionResult {
    /// An accepted result with the standard message.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: "Event accepted.".to_string(),
        }
    }

    /// A rejection carrying the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: reason.into(),
        }
    }
}
