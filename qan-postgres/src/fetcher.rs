use async_trait::async_trait;
use chrono::Utc;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::{OptionalExtension, QueryableByName};
use diesel_async::RunQueryDsl;
use qan_common::QanError;
use qan_core::{Fetcher, Snapshot};

use crate::pool::{self, PgPool};
use crate::row::{PostgresStatementRow, RawStatStatementsRow};

const STAT_STATEMENTS_QUERY: &str = "\
    SELECT queryid::text AS queryid, query, userid::text AS userid, dbid::text AS dbid, \
           calls, total_plan_time, total_exec_time, rows, \
           shared_blks_hit, shared_blks_read, shared_blks_dirtied, shared_blks_written, \
           local_blks_hit, local_blks_read, local_blks_dirtied, local_blks_written, \
           temp_blks_read, temp_blks_written, blk_read_time, blk_write_time \
    FROM pg_stat_statements";

const EXTENSION_QUERY: &str =
    "SELECT extname AS value FROM pg_extension WHERE extname = 'pg_stat_statements'";

#[derive(QueryableByName)]
struct ScalarValue {
    #[diesel(sql_type = Text)]
    #[allow(dead_code)]
    value: String,
}

pub struct PostgresFetcher {
    instance_id: String,
    pool: PgPool,
}

impl PostgresFetcher {
    pub fn new(instance_id: String, pool: PgPool) -> Self {
        Self { instance_id, pool }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

#[async_trait]
impl Fetcher for PostgresFetcher {
    type Row = PostgresStatementRow;

    async fn preflight(&self) -> Result<(), QanError> {
        let mut conn = pool::get_conn(&self.pool).await?;

        let installed: Option<ScalarValue> = sql_query(EXTENSION_QUERY)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|e| QanError::query(format!("failed to read pg_extension: {}", e)))?;

        match installed {
            Some(_) => Ok(()),
            None => Err(QanError::preflight("pg_stat_statements is not installed")),
        }
    }

    async fn snapshot(&self, instance_id: &str) -> Result<Snapshot<Self::Row>, QanError> {
        self.preflight().await?;

        let mut conn = pool::get_conn(&self.pool).await?;
        let wall_clock_taken = Utc::now();

        let raw_rows: Vec<RawStatStatementsRow> = sql_query(STAT_STATEMENTS_QUERY)
            .load(&mut conn)
            .await
            .map_err(|e| QanError::query(format!("failed to read pg_stat_statements: {}", e)))?;

        let rows = raw_rows
            .into_iter()
            .filter_map(RawStatStatementsRow::into_statement_row)
            .map(|row| (row.query_id.clone(), row))
            .collect();

        Ok(Snapshot::new(instance_id.to_owned(), wall_clock_taken, rows))
    }

    async fn close(&self) {
        self.pool.close();
    }
}
