//! Derived views: per-node latest status and the fleet summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StatusEvent;

/// The most recent event of one node, reshaped for the node list.
///
/// Never persisted; derived on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// Node identifier.
    pub node_name: String,
    /// Machine reported by the latest event.
    pub machine: String,
    /// Fleet reported by the latest event.
    pub fleet: String,
    /// Status of the latest event.
    pub last_status: String,
    /// Event type of the latest event.
    pub last_event_type: String,
    /// Module of the latest event.
    pub last_module: String,
    /// Timestamp of the latest event.
    pub last_seen: DateTime<Utc>,
    /// Message of the latest event.
    pub last_message: String,
}

impl NodeStatus {
    /// Builds a node status from the node's latest event.
    ///
    /// Nodes are matched case-insensitively, so the reported name is the
    /// spelling used by the latest event.
    pub fn from_latest(latest: &StatusEvent) -> Self {
        Self {
            node_name: latest.node_name.clone(),
            machine: latest.machine.clone(),
            fleet: latest.fleet.clone(),
            last_status: latest.status.clone(),
            last_event_type: latest.event_type.clone(),
            last_module: latest.module.clone(),
            last_seen: latest.timestamp,
            last_message: latest.message.clone(),
        }
    }
}

/// Point-in-time fleet health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Distinct nodes with at least one retained event.
    pub total_nodes: u64,
    /// Nodes whose latest event falls inside the active window.
    pub active_nodes: u64,
    /// Events with status `alert` in the last hour.
    pub alerts_last_hour: u64,
    /// Events with status `failed` in the last hour.
    pub failures_last_hour: u64,
    /// When this snapshot was computed.
    pub generated_at: DateTime<Utc>,
}
