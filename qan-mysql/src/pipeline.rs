use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qan_common::{Metrics, ReportableError};
use qan_core::{Fetcher, Family, LogBuilder, LogsSink, SnapshotStore};
use qan_governor::AdaptiveGovernor;
use qan_scheduler::TickPipeline;

use crate::delta::diff_mysql;
use crate::fetcher::MySQLFetcher;
use crate::load_probe::LoadProbe;
use crate::row::MysqlStatementRow;

/// Drives one MySQL instance's tick (§4.8, specialized to the family this crate owns):
/// optionally the load probe and governor, then fetch -> delta -> build -> dispatch.
/// Owns every piece of per-instance mutable state directly, per §9's "no process-global
/// registry" note.
pub struct MysqlPipeline {
    instance_id: String,
    fetcher: MySQLFetcher,
    store: SnapshotStore<MysqlStatementRow>,
    sink: Arc<dyn LogsSink>,
    metrics: Metrics,
    fixed_interval: Duration,
    adaptive: Option<AdaptivePart>,
}

struct AdaptivePart {
    governor: AdaptiveGovernor,
    load_probe: LoadProbe,
}

impl MysqlPipeline {
    pub fn fixed(
        instance_id: String,
        fetcher: MySQLFetcher,
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
            fixed_interval: interval,
            adaptive: None,
        }
    }

    pub fn adaptive(
        instance_id: String,
        fetcher: MySQLFetcher,
        sink: Arc<dyn LogsSink>,
        metrics: Metrics,
        governor: AdaptiveGovernor,
        load_probe: LoadProbe,
    ) -> Self {
        let fixed_interval = governor.current_interval();
        Self {
            instance_id,
            fetcher,
            store: SnapshotStore::new(),
            sink,
            metrics,
            fixed_interval,
            adaptive: Some(AdaptivePart {
                governor,
                load_probe,
            }),
        }
    }
}

#[async_trait]
impl TickPipeline for MysqlPipeline {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn current_interval(&self) -> Duration {
        match &self.adaptive {
            Some(part) => part.governor.current_interval(),
            None => self.fixed_interval,
        }
    }

    async fn tick(&mut self) -> Duration {
        let _timer = self.metrics.start_timer("qan.mysql.tick");

        let next_interval = if let Some(part) = &mut self.adaptive {
            match part.load_probe.probe().await {
                Ok(load) => {
                    part.governor.update(load);
                }
                Err(err) => {
                    slog_scope::warn!("load probe failed"; "instance_id" => &self.instance_id, "error" => err.to_string());
                }
            }
            part.governor.request_interval()
        } else {
            self.fixed_interval
        };

        let snapshot = match self.fetcher.snapshot(&self.instance_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.metrics.incr("qan.mysql.fetch_error");
                slog_scope::warn!("mysql snapshot failed"; "instance_id" => &self.instance_id, "kind" => err.metric_label().unwrap_or_default(), "error" => err.to_string());
                return next_interval;
            }
        };

        let previous = self.store.put(snapshot);
        let Some(previous) = previous else {
            return next_interval;
        };

        let current = self
            .store
            .get(&self.instance_id)
            .expect("snapshot just stored");
        let records = diff_mysql(&previous, &current);

        if !records.is_empty() {
            let batch = LogBuilder::build(Family::Mysql, &self.instance_id, &records);
            if let Err(err) = self.sink.consume(batch).await {
                self.metrics.incr("qan.mysql.sink_error");
                slog_scope::warn!("sink rejected batch"; "instance_id" => &self.instance_id, "error" => err.to_string());
            } else {
                self.metrics.gauge("qan.mysql.records", records.len() as u64);
            }
        }

        next_interval
    }

    async fn close(&mut self) {
        if let Some(part) = &self.adaptive {
            if let Err(err) = part.governor.save() {
                slog_scope::warn!("failed to persist governor state on stop"; "instance_id" => &self.instance_id, "error" => err.to_string());
            }
        }
        self.fetcher.close().await;
    }
}
