//! Bounded, expiring in-process event store.
//!
//! Each node owns an append-only log capped at `max_events_per_node`. Logs
//! live in a map guarded by an `RwLock`, and each log has its own `Mutex`:
//!
//! - appends to an existing node take the map lock shared and the node lock
//!   exclusively, so different nodes never contend;
//! - the first append to a node, and removal of emptied nodes, take the map
//!   lock exclusively.
//!
//! Because an append holds the map lock for its whole duration, a node can
//! never be removed between lookup and append, and no append is lost.
//! Critical sections only touch memory.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use fleetwatch_types::{clamp_take, NodeStatus, StatusEvent, StoreProvider, Summary};

use crate::error::StoreError;
use crate::options::MemoryStoreOptions;
use crate::store::EventStore;

/// A stored event with its insertion sequence number.
#[derive(Debug)]
struct Entry {
    seq: u64,
    event: StatusEvent,
}

impl Entry {
    /// Sort key for "most recent": timestamp, then insertion order.
    fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.event.timestamp, self.seq)
    }
}

/// The retained events of one node, in insertion order.
#[derive(Debug, Default)]
struct NodeLog {
    entries: VecDeque<Entry>,
    /// Smallest timestamp in `entries`; lets pruning skip untouched nodes.
    oldest: Option<DateTime<Utc>>,
}

impl NodeLog {
    fn push(&mut self, seq: u64, event: StatusEvent) {
        let ts = event.timestamp;
        self.oldest = Some(self.oldest.map_or(ts, |oldest| oldest.min(ts)));
        self.entries.push_back(Entry { seq, event });
    }

    /// Drops entries from the front until at most `capacity` remain.
    fn evict_to(&mut self, capacity: usize) -> usize {
        let excess = self.entries.len().saturating_sub(capacity);
        if excess > 0 {
            self.entries.drain(..excess);
            self.recompute_oldest();
        }
        excess
    }

    /// Drops every entry older than `cutoff`.
    ///
    /// Producers normally submit in timestamp order, so this usually removes
    /// a prefix, but out-of-order events are removed too.
    fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        match self.oldest {
            Some(oldest) if oldest < cutoff => {}
            _ => return 0,
        }

        let before = self.entries.len();
        self.entries.retain(|entry| entry.event.timestamp >= cutoff);
        self.recompute_oldest();
        before - self.entries.len()
    }

    fn recompute_oldest(&mut self) {
        self.oldest = self.entries.iter().map(|e| e.event.timestamp).min();
    }

    fn latest(&self) -> Option<&Entry> {
        self.entries.iter().max_by_key(|entry| entry.recency())
    }

    fn newest_first(&self, take: usize) -> Vec<StatusEvent> {
        let mut ordered: Vec<&Entry> = self.entries.iter().collect();
        ordered.sort_unstable_by(|a, b| b.recency().cmp(&a.recency()));
        ordered
            .into_iter()
            .take(take)
            .map(|entry| entry.event.clone())
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Nodes are keyed case-insensitively.
fn node_key(node_name: &str) -> String {
    node_name.to_ascii_lowercase()
}

fn lock_log(log: &Mutex<NodeLog>) -> MutexGuard<'_, NodeLog> {
    match log.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // A panicking writer can at worst leave a log mid-eviction, which
            // is still a valid log.
            tracing::error!("node log lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Bounded in-memory [`EventStore`].
///
/// Nothing survives a restart. Growth is bounded by the per-node capacity
/// and by retention pruning, which runs inline on every operation.
#[derive(Debug)]
pub struct MemoryEventStore {
    options: MemoryStoreOptions,
    nodes: RwLock<HashMap<String, Mutex<NodeLog>>>,
    next_seq: AtomicU64,
}

impl MemoryEventStore {
    /// Creates an empty store.
    pub fn new(options: MemoryStoreOptions) -> Self {
        Self {
            options,
            nodes: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn capacity(&self) -> usize {
        self.options.max_events_per_node.max(1)
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, HashMap<String, Mutex<NodeLog>>> {
        self.nodes.read().unwrap_or_else(|poisoned| {
            tracing::error!("node map lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, HashMap<String, Mutex<NodeLog>>> {
        self.nodes.write().unwrap_or_else(|poisoned| {
            tracing::error!("node map lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Runs `f` on the log of `node_name`, creating the log if needed.
    ///
    /// The map lock is held (shared or exclusive) until `f` returns.
    fn with_node_log<R>(&self, node_name: &str, f: impl FnOnce(&mut NodeLog) -> R) -> R {
        let key = node_key(node_name);

        {
            let nodes = self.read_nodes();
            if let Some(log) = nodes.get(&key) {
                let mut log = lock_log(log);
                return f(&mut log);
            }
        }

        let mut nodes = self.write_nodes();
        let log = nodes.entry(key).or_default();
        let log = log.get_mut().unwrap_or_else(PoisonError::into_inner);
        f(log)
    }

    /// Removes expired events as of `now`, then drops nodes left empty.
    fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = self.options.retention.retention_cutoff(now);

        let (removed, emptied) = {
            let nodes = self.read_nodes();
            let mut removed = 0;
            let mut emptied = false;
            for log in nodes.values() {
                let mut log = lock_log(log);
                removed += log.prune_before(cutoff);
                emptied |= log.is_empty();
            }
            (removed, emptied)
        };

        if emptied {
            // Re-checked under the exclusive lock: an append may have refilled
            // a node between the two phases.
            let mut nodes = self.write_nodes();
            nodes.retain(|_, log| !log.get_mut().unwrap_or_else(PoisonError::into_inner).is_empty());
        }

        if removed > 0 {
            tracing::debug!(removed, "pruned expired in-memory events");
        }
        removed
    }

    /// Latest status of every node as of `now`, pruning first.
    ///
    /// Nodes with equal `last_seen` are ordered by latest insertion.
    fn statuses_at(&self, now: DateTime<Utc>) -> Vec<NodeStatus> {
        self.prune_at(now);

        let mut latest: Vec<(u64, NodeStatus)> = {
            let nodes = self.read_nodes();
            nodes
                .values()
                .filter_map(|log| {
                    let log = lock_log(log);
                    log.latest()
                        .map(|entry| (entry.seq, NodeStatus::from_latest(&entry.event)))
                })
                .collect()
        };

        latest.sort_unstable_by(|(seq_a, a), (seq_b, b)| {
            (b.last_seen, *seq_b).cmp(&(a.last_seen, *seq_a))
        });
        latest.into_iter().map(|(_, status)| status).collect()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new(MemoryStoreOptions::default())
    }
}

impl EventStore for MemoryEventStore {
    fn provider(&self) -> StoreProvider {
        StoreProvider::InMemory
    }

    fn add(&self, event: StatusEvent) -> Result<(), StoreError> {
        let capacity = self.capacity();
        let node_name = event.node_name.clone();

        let evicted = self.with_node_log(&node_name, |log| {
            // Assigned under the node lock, so sequence order within a node
            // equals append order.
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            log.push(seq, event);
            log.evict_to(capacity)
        });

        if evicted > 0 {
            tracing::debug!(node = %node_name, evicted, "evicted events over node capacity");
        }

        self.prune_at(Utc::now());
        Ok(())
    }

    fn node_statuses(&self) -> Result<Vec<NodeStatus>, StoreError> {
        Ok(self.statuses_at(Utc::now()))
    }

    fn node_events(&self, node_name: &str, take: i64) -> Result<Vec<StatusEvent>, StoreError> {
        self.prune_at(Utc::now());

        let nodes = self.read_nodes();
        let events = match nodes.get(&node_key(node_name)) {
            Some(log) => lock_log(log).newest_first(clamp_take(take)),
            None => Vec::new(),
        };
        Ok(events)
    }

    fn summary(&self) -> Result<Summary, StoreError> {
        let now = Utc::now();
        let statuses = self.statuses_at(now);

        let active_cutoff = self.options.retention.active_cutoff(now);
        let active_nodes = statuses
            .iter()
            .filter(|status| status.last_seen >= active_cutoff)
            .count();

        let hour_cutoff = self.options.retention.hour_cutoff(now);
        let (alerts, failures) = {
            let nodes = self.read_nodes();
            let mut alerts = 0u64;
            let mut failures = 0u64;
            for log in nodes.values() {
                let log = lock_log(log);
                for entry in log.entries.iter().filter(|e| e.event.timestamp >= hour_cutoff) {
                    if entry.event.is_alert() {
                        alerts += 1;
                    } else if entry.event.is_failure() {
                        failures += 1;
                    }
                }
            }
            (alerts, failures)
        };

        Ok(Summary {
            total_nodes: statuses.len() as u64,
            active_nodes: active_nodes as u64,
            alerts_last_hour: alerts,
            failures_last_hour: failures,
            generated_at: Utc::now(),
        })
    }

    fn prune_expired(&self) -> Result<usize, StoreError> {
        Ok(self.prune_at(Utc::now()))
    }
}
