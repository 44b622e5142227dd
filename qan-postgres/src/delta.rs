use qan_core::{time_period_seconds, CounterValue, DeltaRecord, MonotonicCounter, Snapshot};

use crate::row::PostgresStatementRow;

/// `DeltaEngine::diff` specialized for `pg_stat_statements` rows (§4.2). A separate free
/// function from `qan_mysql::diff_mysql` rather than a shared generic: the two families'
/// counter sets don't overlap beyond the reset-aware subtraction primitive itself.
pub fn diff_postgres(
    prev: &Snapshot<PostgresStatementRow>,
    curr: &Snapshot<PostgresStatementRow>,
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
    curr: &PostgresStatementRow,
    prev: Option<&PostgresStatementRow>,
    time_period_seconds: f64,
) -> DeltaRecord {
    macro_rules! int_delta {
        ($field:ident) => {
            CounterValue::Int(match prev {
                Some(prev) => curr.$field.reset_aware_delta(prev.$field),
                None => curr.$field,
            } as i64)
        };
    }
    macro_rules! float_delta {
        ($field:ident) => {
            CounterValue::Float(match prev {
                Some(prev) => curr.$field.reset_aware_delta(prev.$field),
                None => curr.$field,
            })
        };
    }

    let calls_delta = int_delta!(calls);
    let rows_delta = int_delta!(rows);

    let counters = vec![
        ("db.query.calls.delta", calls_delta),
        ("db.query.total_plan_time.delta", float_delta!(total_plan_time)),
        ("db.query.total_exec_time.delta", float_delta!(total_exec_time)),
        ("db.query.rows.delta", rows_delta),
        // mirrors rows.delta for cross-family compatibility with the MySQL attribute set (§6)
        ("db.query.rows_examined.delta", rows_delta),
        ("db.query.shared_blks_hit.delta", int_delta!(shared_blks_hit)),
        ("db.query.shared_blks_read.delta", int_delta!(shared_blks_read)),
        (
            "db.query.shared_blks_dirtied.delta",
            int_delta!(shared_blks_dirtied),
        ),
        (
            "db.query.shared_blks_written.delta",
            int_delta!(shared_blks_written),
        ),
        ("db.query.local_blks_hit.delta", int_delta!(local_blks_hit)),
        ("db.query.local_blks_read.delta", int_delta!(local_blks_read)),
        (
            "db.query.local_blks_dirtied.delta",
            int_delta!(local_blks_dirtied),
        ),
        (
            "db.query.local_blks_written.delta",
            int_delta!(local_blks_written),
        ),
        ("db.query.temp_blks_read.delta", int_delta!(temp_blks_read)),
        (
            "db.query.temp_blks_written.delta",
            int_delta!(temp_blks_written),
        ),
        ("db.query.blk_read_time.delta", float_delta!(blk_read_time)),
        ("db.query.blk_write_time.delta", float_delta!(blk_write_time)),
    ];

    DeltaRecord {
        key: curr.query_id.clone(),
        text: curr.text.clone(),
        time_period_seconds,
        identity: vec![
            ("db.query.id", curr.query_id.clone()),
            ("db.user.id", curr.user_id.clone()),
            ("db.name.id", curr.db_id.clone()),
        ],
        counters,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    fn row(query_id: &str, calls: u64, total_exec_time: f64) -> PostgresStatementRow {
        PostgresStatementRow {
            query_id: query_id.to_owned(),
            text: "SELECT $1".to_owned(),
            user_id: "16384".to_owned(),
            db_id: "16385".to_owned(),
            calls,
            total_plan_time: 0.0,
            total_exec_time,
            rows: calls,
            shared_blks_hit: 0,
            shared_blks_read: 0,
            shared_blks_dirtied: 0,
            shared_blks_written: 0,
            local_blks_hit: 0,
            local_blks_read: 0,
            local_blks_dirtied: 0,
            local_blks_written: 0,
            temp_blks_read: 0,
            temp_blks_written: 0,
            blk_read_time: 0.0,
            blk_write_time: 0.0,
        }
    }

    fn snapshot(
        rows: Vec<PostgresStatementRow>,
        wall_clock_taken: DateTime<Utc>,
    ) -> Snapshot<PostgresStatementRow> {
        let rows = rows
            .into_iter()
            .map(|r| (r.query_id.clone(), r))
            .collect::<HashMap<_, _>>();
        Snapshot::new("postgresql://localhost/db".to_owned(), wall_clock_taken, rows)
    }

    #[test]
    fn new_key_emits_current_values_verbatim() {
        let t0 = Utc::now();
        let prev = snapshot(vec![], t0);
        let curr = snapshot(vec![row("123", 5, 12.5)], t0 + chrono::Duration::seconds(1));
        let records = diff_postgres(&prev, &curr);
        assert_eq!(records.len(), 1);
        assert!(records[0]
            .counters
            .iter()
            .any(|(k, v)| *k == "db.query.calls.delta" && *v == CounterValue::Int(5)));
    }

    #[test]
    fn counter_reset_attributes_current_value() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("123", 100, 500.0)], t0);
        let curr = snapshot(vec![row("123", 3, 12.0)], t0 + chrono::Duration::seconds(1));
        let records = diff_postgres(&prev, &curr);
        assert_eq!(records.len(), 1);
        assert!(records[0]
            .counters
            .iter()
            .any(|(k, v)| *k == "db.query.calls.delta" && *v == CounterValue::Int(3)));
    }

    #[test]
    fn no_activity_is_filtered_out() {
        let t0 = Utc::now();
        let prev = snapshot(vec![row("123", 10, 100.0)], t0);
        let curr = snapshot(vec![row("123", 10, 100.0)], t0 + chrono::Duration::seconds(10));
        assert!(diff_postgres(&prev, &curr).is_empty());
    }
}
