use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// A point-in-time materialization of every statement row known for one instance.
///
/// `Row` is deliberately left generic rather than a shared `Row` trait object: MySQL and
/// Postgres rows carry entirely different counter sets, and nothing above the fetcher
/// needs to treat them uniformly except by holding one or the other.
#[derive(Debug, Clone)]
pub struct Snapshot<Row> {
    pub instance_id: String,
    pub wall_clock_taken: DateTime<Utc>,
    pub rows: HashMap<String, Row>,
}

impl<Row> Snapshot<Row> {
    pub fn new(instance_id: String, wall_clock_taken: DateTime<Utc>, rows: HashMap<String, Row>) -> Self {
        Self {
            instance_id,
            wall_clock_taken,
            rows,
        }
    }
}

/// Per-instance latest-snapshot cache. Mirrors the `RwLock<HashMap<..>>` shape used for the
/// collection cache elsewhere in this codebase: many concurrent readers across instances,
/// one writer per instance, and never more than one snapshot retained per instance.
pub struct SnapshotStore<Row> {
    snapshots: RwLock<HashMap<String, Arc<Snapshot<Row>>>>,
}

impl<Row> Default for SnapshotStore<Row> {
    fn default() -> Self {
        Self {
            snapshots: RwLock::default(),
        }
    }
}

impl<Row> SnapshotStore<Row> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance_id: &str) -> Option<Arc<Snapshot<Row>>> {
        self.snapshots
            .read()
            .expect("snapshot store lock poisoned")
            .get(instance_id)
            .cloned()
    }

    /// Replaces the stored snapshot for `snapshot.instance_id`, returning the previous one
    /// if present. Never retains more than one snapshot per instance.
    pub fn put(&self, snapshot: Snapshot<Row>) -> Option<Arc<Snapshot<Row>>> {
        self.snapshots
            .write()
            .expect("snapshot store lock poisoned")
            .insert(snapshot.instance_id.clone(), Arc::new(snapshot))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store: SnapshotStore<u64> = SnapshotStore::new();
        assert!(store.get("mysql://localhost/db").is_none());

        let mut rows = HashMap::new();
        rows.insert("digest1".to_owned(), 42u64);
        let snap = Snapshot::new("mysql://localhost/db".to_owned(), Utc::now(), rows);
        store.put(snap);

        let fetched = store.get("mysql://localhost/db").unwrap();
        assert_eq!(fetched.rows.get("digest1"), Some(&42));
    }

    #[test]
    fn put_replaces_previous_snapshot() {
        let store: SnapshotStore<u64> = SnapshotStore::new();
        store.put(Snapshot::new(
            "mysql://localhost/db".to_owned(),
            Utc::now(),
            HashMap::new(),
        ));
        let prev = store.put(Snapshot::new(
            "mysql://localhost/db".to_owned(),
            Utc::now(),
            HashMap::new(),
        ));
        assert!(prev.is_some());
    }
}
