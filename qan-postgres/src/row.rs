use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::QueryableByName;

/// One row of `pg_stat_statements`, as read straight off the wire. Mapped into
/// [`PostgresStatementRow`] by [`crate::fetcher::PostgresFetcher`], applying the
/// null-handling rule from §9: rows with a null `queryid` (the primary key) are skipped
/// entirely, rows with null `userid`/`dbid` keep them as empty strings.
#[derive(Debug, QueryableByName)]
pub struct RawStatStatementsRow {
    #[diesel(sql_type = Nullable<Text>)]
    pub queryid: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub query: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub userid: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub dbid: Option<String>,
    #[diesel(sql_type = BigInt)]
    pub calls: i64,
    #[diesel(sql_type = Double)]
    pub total_plan_time: f64,
    #[diesel(sql_type = Double)]
    pub total_exec_time: f64,
    #[diesel(sql_type = BigInt)]
    pub rows: i64,
    #[diesel(sql_type = BigInt)]
    pub shared_blks_hit: i64,
    #[diesel(sql_type = BigInt)]
    pub shared_blks_read: i64,
    #[diesel(sql_type = BigInt)]
    pub shared_blks_dirtied: i64,
    #[diesel(sql_type = BigInt)]
    pub shared_blks_written: i64,
    #[diesel(sql_type = BigInt)]
    pub local_blks_hit: i64,
    #[diesel(sql_type = BigInt)]
    pub local_blks_read: i64,
    #[diesel(sql_type = BigInt)]
    pub local_blks_dirtied: i64,
    #[diesel(sql_type = BigInt)]
    pub local_blks_written: i64,
    #[diesel(sql_type = BigInt)]
    pub temp_blks_read: i64,
    #[diesel(sql_type = BigInt)]
    pub temp_blks_written: i64,
    #[diesel(sql_type = Double)]
    pub blk_read_time: f64,
    #[diesel(sql_type = Double)]
    pub blk_write_time: f64,
}

/// One statement's counters at one point in time (§3). Count-like counters are `u64`;
/// the four timing counters (`total_plan_time`, `total_exec_time`, `blk_read_time`,
/// `blk_write_time`) are `f64` milliseconds, matching `pg_stat_statements`'s
/// `double precision` columns.
#[derive(Debug, Clone)]
pub struct PostgresStatementRow {
    pub query_id: String,
    pub text: String,
    pub user_id: String,
    pub db_id: String,
    pub calls: u64,
    pub total_plan_time: f64,
    pub total_exec_time: f64,
    pub rows: u64,
    pub shared_blks_hit: u64,
    pub shared_blks_read: u64,
    pub shared_blks_dirtied: u64,
    pub shared_blks_written: u64,
    pub local_blks_hit: u64,
    pub local_blks_read: u64,
    pub local_blks_dirtied: u64,
    pub local_blks_written: u64,
    pub temp_blks_read: u64,
    pub temp_blks_written: u64,
    pub blk_read_time: f64,
    pub blk_write_time: f64,
}

impl RawStatStatementsRow {
    /// Returns `None` for rows with a null `queryid` (the primary key): these are
    /// skipped during materialization, never surfaced as a `PostgresStatementRow`.
    pub fn into_statement_row(self) -> Option<PostgresStatementRow> {
        let query_id = self.queryid?;
        Some(PostgresStatementRow {
            query_id,
            text: self.query.unwrap_or_default(),
            user_id: self.userid.unwrap_or_default(),
            db_id: self.dbid.unwrap_or_default(),
            calls: self.calls.max(0) as u64,
            total_plan_time: self.total_plan_time,
            total_exec_time: self.total_exec_time,
            rows: self.rows.max(0) as u64,
            shared_blks_hit: self.shared_blks_hit.max(0) as u64,
            shared_blks_read: self.shared_blks_read.max(0) as u64,
            shared_blks_dirtied: self.shared_blks_dirtied.max(0) as u64,
            shared_blks_written: self.shared_blks_written.max(0) as u64,
            local_blks_hit: self.local_blks_hit.max(0) as u64,
            local_blks_read: self.local_blks_read.max(0) as u64,
            local_blks_dirtied: self.local_blks_dirtied.max(0) as u64,
            local_blks_written: self.local_blks_written.max(0) as u64,
            temp_blks_read: self.temp_blks_read.max(0) as u64,
            temp_blks_written: self.temp_blks_written.max(0) as u64,
            blk_read_time: self.blk_read_time,
            blk_write_time: self.blk_write_time,
        })
    }
}
