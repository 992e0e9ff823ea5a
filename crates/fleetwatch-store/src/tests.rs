//! Contract tests run against both backends.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fleetwatch_db::{create_pool, DbRuntimeSettings};
use fleetwatch_types::StatusEvent;
use tempfile::TempDir;

use crate::error::StoreError;
use crate::memory::MemoryEventStore;
use crate::options::{MemoryStoreOptions, RetentionPolicy, SqliteStoreOptions};
use crate::sqlite::SqliteEventStore;
use crate::store::EventStore;

/// Both backends with identical retention windows. Holds the temp dir for
/// the SQLite file alive.
struct Backends {
    _dir: TempDir,
    memory: Arc<dyn EventStore>,
    sqlite: Arc<dyn EventStore>,
}

impl Backends {
    fn all(&self) -> [(&'static str, &Arc<dyn EventStore>); 2] {
        [("in_memory", &self.memory), ("sqlite", &self.sqlite)]
    }
}

fn sqlite_options(dir: &TempDir, retention: RetentionPolicy) -> SqliteStoreOptions {
    SqliteStoreOptions {
        retention,
        path: dir
            .path()
            .join("events.db")
            .to_str()
            .expect("utf-8 path")
            .to_string(),
        ..SqliteStoreOptions::default()
    }
}

fn backends() -> Backends {
    let retention = RetentionPolicy::default();
    let dir = tempfile::tempdir().expect("should create temp dir");
    let sqlite = SqliteEventStore::open(&sqlite_options(&dir, retention))
        .expect("sqlite store should open");
    let memory = MemoryEventStore::new(MemoryStoreOptions {
        retention,
        max_events_per_node: 5_000,
    });

    Backends {
        _dir: dir,
        memory: Arc::new(memory),
        sqlite: Arc::new(sqlite),
    }
}

fn event(node: &str, event_type: &str, status: &str, timestamp: DateTime<Utc>) -> StatusEvent {
    StatusEvent {
        timestamp,
        machine: format!("{node}-host"),
        user: "svc".to_string(),
        fleet: "north".to_string(),
        node_name: node.to_string(),
        event_type: event_type.to_string(),
        module: "system".to_string(),
        status: status.to_string(),
        message: format!("{event_type} from {node}"),
    }
}

fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

// ── add / node_events ────────────────────────────────────────────────

#[test]
fn added_event_is_returned_by_node_events() {
    let b = backends();
    for (name, store) in b.all() {
        let e = event("N1", "heartbeat", "ok", minutes_ago(1));
        store.add(e.clone()).expect("add should succeed");

        let events = store.node_events("N1", 1000).expect("read should succeed");
        assert_eq!(events, vec![e], "{name}");
    }
}

#[test]
fn node_events_are_newest_first() {
    let b = backends();
    for (name, store) in b.all() {
        let e1 = event("N1", "heartbeat", "ok", minutes_ago(2));
        let e2 = event("N1", "module_result", "ok", minutes_ago(1));
        store.add(e1.clone()).expect("add e1");
        store.add(e2.clone()).expect("add e2");

        let events = store.node_events("N1", 100).expect("read should succeed");
        assert_eq!(events, vec![e2, e1], "{name}");
    }
}

#[test]
fn equal_timestamps_prefer_later_insert() {
    let b = backends();
    let ts = minutes_ago(3);
    for (name, store) in b.all() {
        let mut first = event("N1", "heartbeat", "ok", ts);
        first.message = "first".to_string();
        let mut second = event("N1", "module_result", "alert", ts);
        second.message = "second".to_string();

        store.add(first).expect("add first");
        store.add(second).expect("add second");

        let events = store.node_events("N1", 10).expect("read should succeed");
        assert_eq!(events[0].message, "second", "{name}");
        assert_eq!(events[1].message, "first", "{name}");

        let statuses = store.node_statuses().expect("statuses should succeed");
        assert_eq!(statuses.len(), 1, "{name}");
        assert_eq!(statuses[0].last_message, "second", "{name}");
    }
}

#[test]
fn node_events_take_is_clamped() {
    let b = backends();
    for (name, store) in b.all() {
        for i in 0..5 {
            store
                .add(event("N1", "heartbeat", "ok", minutes_ago(10 - i)))
                .expect("add should succeed");
        }

        assert_eq!(store.node_events("N1", 0).expect("take 0").len(), 1, "{name}");
        assert_eq!(store.node_events("N1", -7).expect("take -7").len(), 1, "{name}");
        assert_eq!(store.node_events("N1", 3).expect("take 3").len(), 3, "{name}");
        assert_eq!(
            store.node_events("N1", 5_000).expect("take 5000").len(),
            5,
            "{name}"
        );
    }
}

#[test]
fn unknown_node_yields_empty_history() {
    let b = backends();
    for (name, store) in b.all() {
        store
            .add(event("N1", "heartbeat", "ok", minutes_ago(1)))
            .expect("add should succeed");
        let events = store.node_events("ghost", 50).expect("read should succeed");
        assert!(events.is_empty(), "{name}");
    }
}

#[test]
fn node_names_match_case_insensitively() {
    let b = backends();
    for (name, store) in b.all() {
        store
            .add(event("Node-A", "heartbeat", "ok", minutes_ago(2)))
            .expect("add first");
        store
            .add(event("NODE-a", "heartbeat", "ok", minutes_ago(1)))
            .expect("add second");

        assert_eq!(store.node_events("node-a", 10).expect("read").len(), 2, "{name}");

        let statuses = store.node_statuses().expect("statuses");
        assert_eq!(statuses.len(), 1, "{name}");
        assert_eq!(statuses[0].node_name, "NODE-a", "{name}");
    }
}

// ── node_statuses ────────────────────────────────────────────────────

#[test]
fn node_statuses_ordered_by_last_seen_descending() {
    let b = backends();
    for (name, store) in b.all() {
        store.add(event("old", "heartbeat", "ok", minutes_ago(30))).expect("add");
        store.add(event("new", "heartbeat", "ok", minutes_ago(1))).expect("add");
        store.add(event("mid", "heartbeat", "ok", minutes_ago(10))).expect("add");

        let names: Vec<String> = store
            .node_statuses()
            .expect("statuses")
            .into_iter()
            .map(|s| s.node_name)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"], "{name}");
    }
}

#[test]
fn latest_status_uses_greatest_timestamp_not_arrival() {
    let b = backends();
    for (name, store) in b.all() {
        store
            .add(event("N1", "module_result", "alert", minutes_ago(1)))
            .expect("add newer");
        store
            .add(event("N1", "heartbeat", "ok", minutes_ago(5)))
            .expect("add late-arriving older");

        let statuses = store.node_statuses().expect("statuses");
        assert_eq!(statuses[0].last_status, "alert", "{name}");
    }
}

#[test]
fn node_statuses_read_is_idempotent() {
    let b = backends();
    for (name, store) in b.all() {
        store.add(event("A", "heartbeat", "ok", minutes_ago(4))).expect("add");
        store.add(event("B", "heartbeat", "failed", minutes_ago(2))).expect("add");

        let first = store.node_statuses().expect("first read");
        let second = store.node_statuses().expect("second read");
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn heartbeat_then_alert_scenario() {
    let b = backends();
    let t = minutes_ago(5);
    for (name, store) in b.all() {
        store.add(event("N1", "heartbeat", "ok", t)).expect("add heartbeat");
        store
            .add(event("N1", "module_result", "alert", t + Duration::seconds(1)))
            .expect("add alert");

        let statuses = store.node_statuses().expect("statuses");
        assert_eq!(statuses.len(), 1, "{name}");
        assert_eq!(statuses[0].node_name, "N1", "{name}");
        assert_eq!(statuses[0].last_status, "alert", "{name}");
        assert_eq!(statuses[0].last_event_type, "module_result", "{name}");

        let summary = store.summary().expect("summary");
        assert_eq!(summary.alerts_last_hour, 1, "{name}");
    }
}

// ── summary ──────────────────────────────────────────────────────────

#[test]
fn summary_counts_nodes_and_hour_window() {
    let b = backends();
    for (name, store) in b.all() {
        store.add(event("active", "heartbeat", "ok", minutes_ago(2))).expect("add");
        store.add(event("idle", "heartbeat", "ok", minutes_ago(45))).expect("add");
        store.add(event("idle", "module_result", "alert", minutes_ago(50))).expect("add");
        store.add(event("stale", "module_result", "alert", minutes_ago(120))).expect("add");
        store.add(event("stale", "module_result", "failed", minutes_ago(90))).expect("add");
        store.add(event("active", "module_result", "failed", minutes_ago(3))).expect("add");
        store.add(event("active", "module_result", "Alert", minutes_ago(3))).expect("add");
        store.add(event("active", "module_result", "FAILED", minutes_ago(3))).expect("add");

        let summary = store.summary().expect("summary");
        assert_eq!(summary.total_nodes, 3, "{name}");
        assert_eq!(summary.active_nodes, 1, "{name}");
        assert_eq!(summary.alerts_last_hour, 1, "{name}");
        assert_eq!(summary.failures_last_hour, 1, "{name}");
        assert!(summary.generated_at <= Utc::now(), "{name}");
    }
}

#[test]
fn summary_of_empty_store_is_zero() {
    let b = backends();
    for (name, store) in b.all() {
        let summary = store.summary().expect("summary");
        assert_eq!(summary.total_nodes, 0, "{name}");
        assert_eq!(summary.active_nodes, 0, "{name}");
        assert_eq!(summary.alerts_last_hour, 0, "{name}");
        assert_eq!(summary.failures_last_hour, 0, "{name}");
    }
}

#[test]
fn backends_agree_on_the_same_event_set() {
    let b = backends();
    let base = minutes_ago(200);
    let events: Vec<StatusEvent> = (0..40)
        .map(|i| {
            let node = format!("node-{}", i % 7);
            let status = match i % 5 {
                0 => "alert",
                1 => "failed",
                _ => "ok",
            };
            event(&node, "module_result", status, base + Duration::minutes(i * 5))
        })
        .collect();

    for (_, store) in b.all() {
        for e in &events {
            store.add(e.clone()).expect("add should succeed");
        }
    }

    let memory = b.memory.summary().expect("memory summary");
    let sqlite = b.sqlite.summary().expect("sqlite summary");
    assert_eq!(memory.total_nodes, 7);
    assert_eq!(memory.total_nodes, sqlite.total_nodes);
    assert_eq!(memory.active_nodes, sqlite.active_nodes);
    assert_eq!(memory.alerts_last_hour, sqlite.alerts_last_hour);
    assert_eq!(memory.failures_last_hour, sqlite.failures_last_hour);

    assert_eq!(
        b.memory.node_statuses().expect("memory statuses"),
        b.sqlite.node_statuses().expect("sqlite statuses")
    );
    for i in 0..7 {
        let node = format!("node-{i}");
        assert_eq!(
            b.memory.node_events(&node, 1000).expect("memory events"),
            b.sqlite.node_events(&node, 1000).expect("sqlite events"),
            "{node}"
        );
    }
}

// ── retention ────────────────────────────────────────────────────────

#[test]
fn expired_events_are_absent_from_every_read() {
    let b = backends();
    for (name, store) in b.all() {
        store
            .add(event("ancient", "module_result", "alert", Utc::now() - Duration::hours(48)))
            .expect("add expired");
        store
            .add(event("N1", "heartbeat", "ok", minutes_ago(1)))
            .expect("add fresh");

        assert!(store.node_events("ancient", 100).expect("events").is_empty(), "{name}");

        let statuses = store.node_statuses().expect("statuses");
        assert!(statuses.iter().all(|s| s.node_name != "ancient"), "{name}");

        let summary = store.summary().expect("summary");
        assert_eq!(summary.total_nodes, 1, "{name}");
    }
}

#[test]
fn expired_node_is_dropped_entirely() {
    let b = backends();
    for (name, store) in b.all() {
        store
            .add(event("N1", "heartbeat", "ok", Utc::now() - Duration::hours(30)))
            .expect("add expired");
        store
            .add(event("N1", "heartbeat", "ok", Utc::now() - Duration::hours(25)))
            .expect("add expired");

        assert!(store.node_statuses().expect("statuses").is_empty(), "{name}");
        assert_eq!(store.summary().expect("summary").total_nodes, 0, "{name}");
    }
}

#[test]
fn prune_expired_reports_removed_count() {
    let short = RetentionPolicy {
        retention_hours: 1,
        active_window_minutes: 10,
    };
    let dir = tempfile::tempdir().expect("should create temp dir");
    let sqlite = SqliteEventStore::open(&sqlite_options(&dir, short)).expect("sqlite store");
    let memory = MemoryEventStore::new(MemoryStoreOptions {
        retention: short,
        max_events_per_node: 100,
    });

    // Written with a long retention so the events survive the inline prune.
    let long = RetentionPolicy {
        retention_hours: 24,
        active_window_minutes: 10,
    };
    let writer = SqliteEventStore::open(&sqlite_options(&dir, long)).expect("writer store");
    for minutes in [90, 80, 30] {
        writer
            .add(event("N1", "heartbeat", "ok", minutes_ago(minutes)))
            .expect("add via writer");
    }
    assert_eq!(sqlite.prune_expired().expect("sqlite prune"), 2);
    assert_eq!(sqlite.prune_expired().expect("sqlite prune again"), 0);
    assert_eq!(sqlite.node_events("N1", 10).expect("events").len(), 1);

    // The in-memory store prunes inline, so nothing is left for the sweep.
    memory
        .add(event("N1", "heartbeat", "ok", minutes_ago(90)))
        .expect("memory add");
    assert_eq!(memory.prune_expired().expect("memory prune"), 0);
    assert!(memory.node_statuses().expect("statuses").is_empty());
}

// ── in-memory capacity and concurrency ───────────────────────────────

#[test]
fn memory_capacity_evicts_oldest_first() {
    let store = MemoryEventStore::new(MemoryStoreOptions {
        retention: RetentionPolicy::default(),
        max_events_per_node: 5,
    });

    let added: Vec<StatusEvent> = (0..8)
        .map(|i| {
            let mut e = event("N1", "heartbeat", "ok", minutes_ago(60 - i));
            e.message = format!("event {i}");
            e
        })
        .collect();
    for e in &added {
        store.add(e.clone()).expect("add should succeed");
    }

    let events = store.node_events("N1", 1000).expect("read should succeed");
    assert_eq!(events.len(), 5);

    let expected: Vec<StatusEvent> = added[3..].iter().rev().cloned().collect();
    assert_eq!(events, expected, "the three oldest are gone");
}

#[test]
fn memory_capacity_is_per_node() {
    let store = MemoryEventStore::new(MemoryStoreOptions {
        retention: RetentionPolicy::default(),
        max_events_per_node: 2,
    });

    for i in 0..4 {
        store.add(event("A", "heartbeat", "ok", minutes_ago(10 - i))).expect("add A");
    }
    store.add(event("B", "heartbeat", "ok", minutes_ago(1))).expect("add B");

    assert_eq!(store.node_events("A", 100).expect("A").len(), 2);
    assert_eq!(store.node_events("B", 100).expect("B").len(), 1);
}

#[test]
fn memory_concurrent_appends_lose_nothing_and_keep_order() {
    let store = Arc::new(MemoryEventStore::new(MemoryStoreOptions {
        retention: RetentionPolicy::default(),
        max_events_per_node: 10_000,
    }));
    let ts = minutes_ago(1);

    std::thread::scope(|scope| {
        for producer in 0..8 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                let node = if producer % 2 == 0 { "shared" } else { "other" };
                for i in 0..200 {
                    let mut e = event(node, "heartbeat", "ok", ts);
                    e.machine = format!("p{producer}");
                    e.message = i.to_string();
                    store.add(e).expect("add should succeed");
                }
            });
        }
    });

    let shared = store.node_events("shared", 1000).expect("shared");
    let other = store.node_events("other", 1000).expect("other");
    assert_eq!(shared.len(), 800);
    assert_eq!(other.len(), 800);

    // Equal timestamps: newest-first is reverse insertion order, so each
    // producer's own messages must appear in descending submission order.
    for producer in (0..8).step_by(2) {
        let machine = format!("p{producer}");
        let seen: Vec<u32> = shared
            .iter()
            .filter(|e| e.machine == machine)
            .map(|e| e.message.parse().expect("numeric message"))
            .collect();
        let mut expected: Vec<u32> = (0..200).collect();
        expected.reverse();
        assert_eq!(seen, expected, "{machine}");
    }
}

// ── sqlite specifics ─────────────────────────────────────────────────

#[test]
fn sqlite_sanitises_hostile_table_name() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let options = SqliteStoreOptions {
        table_name: "events\"; DROP TABLE x".to_string(),
        ..sqlite_options(&dir, RetentionPolicy::default())
    };

    let store = SqliteEventStore::open(&options).expect("store should open");
    assert_eq!(store.table_name(), "eventsDROPTABLEx");

    store
        .add(event("N1", "heartbeat", "ok", minutes_ago(1)))
        .expect("add should succeed");
    assert_eq!(store.node_events("N1", 10).expect("read").len(), 1);
}

#[test]
fn sqlite_without_schema_reports_database_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let options = SqliteStoreOptions {
        auto_create_schema: false,
        ..sqlite_options(&dir, RetentionPolicy::default())
    };

    let store = SqliteEventStore::open(&options).expect("open does not touch the table");
    let err = store
        .add(event("N1", "heartbeat", "ok", minutes_ago(1)))
        .expect_err("insert into a missing table should fail");
    assert!(matches!(err, StoreError::Database(_)), "unexpected error: {err:?}");

    assert!(matches!(store.summary(), Err(StoreError::Database(_))));
}

#[test]
fn sqlite_events_survive_reopen() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let options = sqlite_options(&dir, RetentionPolicy::default());
    let e = event("N1", "heartbeat", "ok", minutes_ago(1));

    {
        let store = SqliteEventStore::open(&options).expect("first open");
        store.add(e.clone()).expect("add should succeed");
    }

    let store = SqliteEventStore::open(&options).expect("second open");
    assert_eq!(store.node_events("N1", 10).expect("read"), vec![e]);
}

#[test]
fn sqlite_store_on_shared_pool() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let options = sqlite_options(&dir, RetentionPolicy::default());
    let pool = create_pool(
        &options.path,
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        },
    )
    .expect("pool should build");

    let store = Arc::new(SqliteEventStore::with_pool(pool, &options).expect("store should open"));

    std::thread::scope(|scope| {
        for producer in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..25 {
                    store
                        .add(event(&format!("node-{producer}"), "heartbeat", "ok", minutes_ago(30 - i)))
                        .expect("concurrent add should succeed");
                }
            });
        }
    });

    let summary = store.summary().expect("summary");
    assert_eq!(summary.total_nodes, 4);
    assert_eq!(store.node_events("node-2", 1000).expect("read").len(), 25);
}
