use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qan_common::{Metrics, ReportableError};
use qan_core::{Fetcher, Family, LogBuilder, LogsSink, SnapshotStore};
use qan_scheduler::TickPipeline;

use crate::delta::diff_postgres;
use crate::fetcher::PostgresFetcher;
use crate::row::PostgresStatementRow;

/// Drives one Postgres instance's tick. Always a fixed interval (§4.8 notes the adaptive
/// governor is MySQL-only, since `pg_stat_statements` carries no equivalent cheap load
/// signal this collector reads today).
pub struct PostgresPipeline {
    instance_id: String,
    fetcher: PostgresFetcher,
    store: SnapshotStore<PostgresStatementRow>,
    sink: Arc<dyn LogsSink>,
    metrics: Metrics,
    interval: Duration,
}

impl PostgresPipeline {
    pub fn new(
        instance_id: String,
        fetcher: PostgresFetcher,
        sink: Arc<dyn LogsSink>,
        metrics: Metrics,
        interval: Duration,
    ) -> Self {
        Self {
            instance_id,
            fetcher,
            store: SnapshotStore::new(),
            sink,
            metrics,
            interval,
        }
    }
}

#[async_trait]
impl TickPipeline for PostgresPipeline {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn current_interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&mut self) -> Duration {
        let _timer = self.metrics.start_timer("qan.postgres.tick");

        let snapshot = match self.fetcher.snapshot(&self.instance_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.metrics.incr("qan.postgres.fetch_error");
                slog_scope::warn!("postgres snapshot failed"; "instance_id" => &self.instance_id, "kind" => err.metric_label().unwrap_or_default(), "error" => err.to_string());
                return self.interval;
            }
        };

        let previous = self.store.put(snapshot);
        let Some(previous) = previous else {
            return self.interval;
        };

        let current = self
            .store
            .get(&self.instance_id)
            .expect("snapshot just stored");
        let records = diff_postgres(&previous, &current);

        if !records.is_empty() {
            let batch = LogBuilder::build(Family::Postgresql, &self.instance_id, &records);
            if let Err(err) = self.sink.consume(batch).await {
                self.metrics.incr("qan.postgres.sink_error");
                slog_scope::warn!("sink rejected batch"; "instance_id" => &self.instance_id, "error" => err.to_string());
            } else {
                self.metrics
                    .gauge("qan.postgres.records", records.len() as u64);
            }
        }

        self.interval
    }

    async fn close(&mut self) {
        self.fetcher.close().await;
    }
}
