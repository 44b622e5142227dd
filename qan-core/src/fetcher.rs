use async_trait::async_trait;
use qan_common::QanError;

use crate::snapshot::Snapshot;

/// The one polymorphic interface a Scheduler depends on, implemented once per family
/// (`MySQLFetcher`, `PostgresFetcher`). Each variant owns a distinct, strongly-typed
/// `Row`; this trait does not attempt to unify MySQL and Postgres rows under a common
/// row type, only under a common capability set (§9 design notes).
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Row: Send + Sync + 'static;

    /// Cheap, per-call check that the server is configured to expose the counters this
    /// fetcher needs. Returns `ErrPreflight` on failure; never mutates any state.
    async fn preflight(&self) -> Result<(), QanError>;

    /// Executes the catalog query and materializes a snapshot. `now` is captured once,
    /// at the start of materialization, and shared by every row in the result.
    async fn snapshot(&self, instance_id: &str) -> Result<Snapshot<Self::Row>, QanError>;

    /// Releases the fetcher's pooled connection handle. Called on scheduler stop.
    async fn close(&self);
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;

    use super::*;

    /// A hand-written in-memory fake standing in for `MySQLFetcher`/`PostgresFetcher` in
    /// tests that only need the polymorphic `Fetcher` capability set, not a real server.
    struct FakeFetcher {
        preflight_ok: bool,
        rows: Vec<(String, u64)>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        type Row = u64;

        async fn preflight(&self) -> Result<(), QanError> {
            if self.preflight_ok {
                Ok(())
            } else {
                Err(QanError::preflight("fake server misconfigured"))
            }
        }

        async fn snapshot(&self, instance_id: &str) -> Result<Snapshot<Self::Row>, QanError> {
            self.preflight().await?;
            let rows = self.rows.iter().cloned().collect::<HashMap<_, _>>();
            Ok(Snapshot::new(instance_id.to_owned(), Utc::now(), rows))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn snapshot_runs_preflight_first_and_propagates_its_failure() {
        let fetcher = FakeFetcher {
            preflight_ok: false,
            rows: vec![],
            closed: AtomicBool::new(false),
        };
        let err = fetcher.snapshot("fake://instance").await.unwrap_err();
        assert!(err.is_preflight());
    }

    #[tokio::test]
    async fn snapshot_materializes_rows_when_preflight_passes() {
        let fetcher = FakeFetcher {
            preflight_ok: true,
            rows: vec![("a".to_owned(), 1), ("b".to_owned(), 2)],
            closed: AtomicBool::new(false),
        };
        let snapshot = fetcher.snapshot("fake://instance").await.unwrap();
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.instance_id, "fake://instance");
    }
}
