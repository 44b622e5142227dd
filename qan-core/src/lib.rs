//! Data model and family-agnostic machinery for the QAN collector: snapshots, delta
//! records, the log batch shape, and the `Fetcher`/`LogsSink` trait seams that the
//! MySQL and Postgres backends plug into.

pub mod delta;
pub mod fetcher;
pub mod log;
pub mod sink;
pub mod snapshot;

pub use delta::{time_period_seconds, CounterValue, DeltaRecord, MonotonicCounter};
pub use fetcher::Fetcher;
pub use log::{AttributeValue, Family, LogBatch, LogBuilder, LogRecord, ResourceScope};
pub use sink::{LogsSink, NullSink};
pub use snapshot::{Snapshot, SnapshotStore};

/// Builds the instance identity string used as the SnapshotStore key and as
/// `resource.instance.id` (§3): `<system>://<endpoint>/<database>`.
pub fn instance_id(family: Family, endpoint: &str, database: &str) -> String {
    format!("{}://{}/{}", family.as_str(), endpoint, database)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instance_id_matches_the_documented_shape() {
        assert_eq!(
            instance_id(Family::Mysql, "db.internal:3306", "information_schema"),
            "mysql://db.internal:3306/information_schema"
        );
    }
}
