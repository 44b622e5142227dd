use diesel::sql_types::{BigInt, Nullable, Text, Unsigned};
use diesel::QueryableByName;

/// One row of `performance_schema.events_statements_summary_by_digest`, as read straight
/// off the wire. Nullable where the column itself is nullable; mapped into
/// [`MysqlStatementRow`] by [`crate::fetcher::MySQLFetcher`], which applies the
/// null-handling rule from §9: rows with a null `digest` are skipped entirely, rows with
/// a null `schema_name` keep it as an empty string.
#[derive(Debug, QueryableByName)]
pub struct RawDigestRow {
    #[diesel(sql_type = Nullable<Text>)]
    pub digest: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub schema_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub digest_text: Option<String>,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub count_star: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_timer_wait: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_lock_time: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_errors: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_warnings: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_rows_affected: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_rows_sent: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_rows_examined: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_created_tmp_tables: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_created_tmp_disk_tables: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_sort_rows: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_no_index_used: u64,
    #[diesel(sql_type = Unsigned<BigInt>)]
    pub sum_no_good_index_used: u64,
}

/// One statement's counters at one point in time (§3). All counters are `u64`: every
/// source column is `BIGINT UNSIGNED` in `performance_schema`.
#[derive(Debug, Clone)]
pub struct MysqlStatementRow {
    pub digest: String,
    pub text: String,
    pub schema: String,
    pub calls: u64,
    pub total_timer_wait: u64,
    pub lock_time: u64,
    pub errors: u64,
    pub warnings: u64,
    pub rows_affected: u64,
    pub rows_sent: u64,
    pub rows_examined: u64,
    pub created_tmp_tables: u64,
    pub created_tmp_disk_tables: u64,
    pub sort_rows: u64,
    pub no_index_used: u64,
    pub no_good_index_used: u64,
}

impl RawDigestRow {
    /// Returns `None` for rows with a null digest (the primary key): these are skipped
    /// during materialization, never surfaced as a `MysqlStatementRow`.
    pub fn into_statement_row(self) -> Option<MysqlStatementRow> {
        let digest = self.digest?;
        Some(MysqlStatementRow {
            digest,
            text: self.digest_text.unwrap_or_default(),
            schema: self.schema_name.unwrap_or_default(),
            calls: self.count_star,
            total_timer_wait: self.sum_timer_wait,
            lock_time: self.sum_lock_time,
            errors: self.sum_errors,
            warnings: self.sum_warnings,
            rows_affected: self.sum_rows_affected,
            rows_sent: self.sum_rows_sent,
            rows_examined: self.sum_rows_examined,
            created_tmp_tables: self.sum_created_tmp_tables,
            created_tmp_disk_tables: self.sum_created_tmp_disk_tables,
            sort_rows: self.sum_sort_rows,
            no_index_used: self.sum_no_index_used,
            no_good_index_used: self.sum_no_good_index_used,
        })
    }
}
