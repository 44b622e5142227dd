use qan_core::{time_period_seconds, CounterValue, DeltaRecord, MonotonicCounter, Snapshot};

use crate::row::MysqlStatementRow;

/// `DeltaEngine::diff` specialized for MySQL digest rows (§4.2). Kept as a free function
/// rather than a trait impl over a shared "Row" type: MySQL and Postgres rows have
/// unrelated counter sets, and the only thing they share is the reset-aware subtraction
/// primitive (`MonotonicCounter`).
pub fn diff_mysql(
    prev: &Snapshot<MysqlStatementRow>,
    curr: &Snapshot<MysqlStatementRow>,
) -> Vec<DeltaRecord> {
    let dt = time_period_seconds(prev, curr);

    curr.rows
        .iter()
        .filter_map(|(key, row)| {
            let prev_row = prev.rows.get(key);
            let record = build_record(row, prev_row, dt);
            if record.calls_delta_is_positive() {
                Some(record)
            } else {
                None
            }
        })
        .collect()
}

fn build_record(
    curr: &MysqlStatementRow,
    prev: Option<&MysqlStatementRow>,
    time_period_seconds: f64,
) -> DeltaRecord {
    macro_rules! delta {
        ($field:ident) => {
            match prev {
                Some(prev) => curr.$field.reset_aware_delta(prev.$field),
                None => curr.$field,
            }
        };
    }

    let counters = vec![
        ("db.query.calls.delta", CounterValue::Int(delta!(calls) as i64)),
        (
            "db.query.total_timer_wait.delta",
            CounterValue::Int(delta!(total_timer_wait) as i64),
        ),
        (
            "db.query.lock_time.delta",
            CounterValue::Int(delta!(lock_time) as i64),
        ),
        ("db.query.errors.delta", CounterValue::Int(delta!(errors) as i64)),
        (
            "db.query.warnings.delta",
            CounterValue::Int(delta!(warnings) as i64),
        ),
        (
            "db.query.rows_affected.delta",
            CounterValue::Int(delta!(rows_affected) as i64),
        ),
        (
            "db.query.rows_sent.delta",
            CounterValue::Int(delta!(rows_sent) as i64),
        ),
        (
            "db.query.rows_examined.delta",
            CounterValue::Int(delta!(rows_examined) as i64),
        ),
        (
            "db.query.created_tmp_tables.delta",
            CounterValue::Int(delta!(created_tmp_tables) as i64),
        ),
        (
            "db.query.created_tmp_disk_tables.delta",
            CounterValue::Int(delta!(created_tmp_disk_tables) as i64),
        ),
        (
            "db.query.sort_rows.delta",
            CounterValue::Int(delta!(sort_rows) as i64),
        ),
        (
            "db.query.no_index_used.delta",
            CounterValue::Int(delta!(no_index_used) as i64),
        ),
        (
            "db.query.no_good_index_used.delta",
            CounterValue::Int(delta!(no_good_index_used) as i64),
        ),
    ];

    DeltaRecord {
        key: curr.digest.clone(),
        text: curr.text.clone(),
        time_period_seconds,
        identity: vec![
            ("db.statement.digest", curr.digest.clone()),
            ("db.schema", curr.schema.clone()),
        ],
        counters,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    fn row(digest: &str, calls: u64, timer: u64) -> MysqlStatementRow {
        MysqlStatementRow {
            digest: digest.to_owned(),
            text: "SELECT ?".to_owned(),
            schema: "prod".to_owned(),
            calls,
            total_timer_wait: timer,
            lock_time: 0,
            errors: 0,
            warnings: 0,
            rows_affected: 0,
            rows_sent: 0,
            rows_examined: 0,
            created_tmp_tables: 0,
            created_tmp_disk_tables: 0,
            sort_rows: 0,
            no_index_used: 0,
            no_good_index_used: 0,
        }
    }

    fn snapshot(
        rows: Vec<MysqlStatementRow>,
        wall_clock_taken: DateTime<Utc>,
    ) -> Snapshot<MysqlStatementRow> {
        let rows = rows.into_iter().map(|r| (r.digest.clone(), r)).collect::<HashMap<_, _>>();
        Snapshot::new("mysql://localhost/db".to_owned(), wall_clock_taken, rows)
    }

    fn counter(record: &DeltaRecord, key: &str) -> CounterValue {
        record
            .counters
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap()
    }

    #[test]
    fn s1_identical_snapshots_produce_no_output() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("A", 10, 1000)], t0);
        let curr = snapshot(vec![row("A", 10, 1000)], t0 + chrono::Duration::seconds(10));
        assert!(diff_mysql(&prev, &curr).is_empty());
    }

    #[test]
    fn s2_counter_advance_produces_one_record() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("A", 10, 1000)], t0);
        let curr = snapshot(vec![row("A", 12, 1400)], t0 + chrono::Duration::seconds(10));
        let records = diff_mysql(&prev, &curr);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(counter(record, "db.query.calls.delta"), CounterValue::Int(2));
        assert_eq!(
            counter(record, "db.query.total_timer_wait.delta"),
            CounterValue::Int(400)
        );
        assert_eq!(record.time_period_seconds, 10.0);
    }

    #[test]
    fn s3_counter_reset_attributes_current_value() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("A", 100, 5000)], t0);
        let curr = snapshot(vec![row("A", 3, 120)], t0 + chrono::Duration::seconds(5));
        let records = diff_mysql(&prev, &curr);
        assert_eq!(records.len(), 1);
        assert_eq!(counter(&records[0], "db.query.calls.delta"), CounterValue::Int(3));
        assert_eq!(
            counter(&records[0], "db.query.total_timer_wait.delta"),
            CounterValue::Int(120)
        );
    }

    #[test]
    fn s4_new_key_emits_current_values_verbatim() {
        let t0 = Utc::now();
        let prev = snapshot(vec![], t0);
        let curr = snapshot(vec![row("B", 5, 250)], t0 + chrono::Duration::seconds(1));
        let records = diff_mysql(&prev, &curr);
        assert_eq!(records.len(), 1);
        assert_eq!(counter(&records[0], "db.query.calls.delta"), CounterValue::Int(5));
        assert_eq!(
            counter(&records[0], "db.query.total_timer_wait.delta"),
            CounterValue::Int(250)
        );
    }

    #[test]
    fn s5_dropped_key_produces_no_output() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("C", 10, 100)], t0);
        let curr = snapshot(vec![], t0 + chrono::Duration::seconds(1));
        assert!(diff_mysql(&prev, &curr).is_empty());
    }

    #[test]
    fn invariant_all_deltas_non_negative() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("A", 50, 500)], t0);
        let curr = snapshot(vec![row("A", 10, 100)], t0 + chrono::Duration::seconds(1));
        for record in diff_mysql(&prev, &curr) {
            for (_, value) in record.counters {
                match value {
                    CounterValue::Int(v) => assert!(v >= 0),
                    CounterValue::Float(v) => assert!(v >= 0.0),
                }
            }
        }
    }
}
