use async_trait::async_trait;
use chrono::Utc;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::{OptionalExtension, QueryableByName};
use diesel_async::RunQueryDsl;
use qan_common::QanError;
use qan_core::{Fetcher, Snapshot};

use crate::pool::{self, MysqlPool};
use crate::row::{MysqlStatementRow, RawDigestRow};

const DIGEST_QUERY: &str = "\
    SELECT digest, schema_name, digest_text, count_star, sum_timer_wait, sum_lock_time, \
           sum_errors, sum_warnings, sum_rows_affected, sum_rows_sent, sum_rows_examined, \
           sum_created_tmp_tables, sum_created_tmp_disk_tables, sum_sort_rows, \
           sum_no_index_used, sum_no_good_index_used \
    FROM performance_schema.events_statements_summary_by_digest \
    WHERE schema_name IS NOT NULL";

#[derive(QueryableByName)]
struct ScalarValue {
    #[diesel(sql_type = Text)]
    value: String,
}

pub struct MySQLFetcher {
    instance_id: String,
    pool: MysqlPool,
}

impl MySQLFetcher {
    pub fn new(instance_id: String, pool: MysqlPool) -> Self {
        Self { instance_id, pool }
    }
}

#[async_trait]
impl Fetcher for MySQLFetcher {
    type Row = MysqlStatementRow;

    async fn preflight(&self) -> Result<(), QanError> {
        let mut conn = pool::get_conn(&self.pool).await?;

        let enabled: ScalarValue = sql_query("SELECT @@performance_schema AS value")
            .get_result(&mut conn)
            .await
            .map_err(|e| QanError::query(format!("failed to read @@performance_schema: {}", e)))?;
        if enabled.value != "1" {
            return Err(QanError::preflight("performance_schema is not ON"));
        }

        let consumer: Option<ScalarValue> = sql_query(
            "SELECT enabled AS value FROM performance_schema.setup_consumers \
             WHERE name = 'statements_digest'",
        )
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| QanError::query(format!("failed to read setup_consumers: {}", e)))?;

        match consumer {
            Some(row) if row.value == "YES" => Ok(()),
            _ => Err(QanError::preflight(
                "the statements_digest consumer is not enabled",
            )),
        }
    }

    async fn snapshot(&self, instance_id: &str) -> Result<Snapshot<Self::Row>, QanError> {
        self.preflight().await?;

        let mut conn = pool::get_conn(&self.pool).await?;
        let wall_clock_taken = Utc::now();

        let raw_rows: Vec<RawDigestRow> = sql_query(DIGEST_QUERY)
            .load(&mut conn)
            .await
            .map_err(|e| QanError::query(format!("failed to read digest table: {}", e)))?;

        let rows = raw_rows
            .into_iter()
            .filter_map(RawDigestRow::into_statement_row)
            .map(|row| (row.digest.clone(), row))
            .collect();

        Ok(Snapshot::new(instance_id.to_owned(), wall_clock_taken, rows))
    }

    async fn close(&self) {
        self.pool.close();
    }
}

impl MySQLFetcher {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
