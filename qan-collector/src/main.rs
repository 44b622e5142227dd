//! QAN collector binary: wires settings, logging, metrics, and the MySQL/Postgres
//! schedulers together, then runs until signalled to stop.
#[macro_use]
extern crate slog_scope;

mod logging;
mod sink;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use docopt::Docopt;
use serde::Deserialize;

use logging::init_logging;
use qan_core::{instance_id, Family, LogsSink};
use qan_governor::AdaptiveGovernor;
use qan_mysql::{self, LoadProbe, MySQLFetcher, MysqlPipeline};
use qan_postgres::{self, PostgresFetcher, PostgresPipeline};
use qan_scheduler::{self, SchedulerHandle};
use qan_settings::{CollectionInterval, Settings};
use sink::StdoutJsonSink;

const USAGE: &str = "
Usage: qan-collector [options]

Options:
    -h, --help               Show this message.
    --config=CONFIGFILE      QAN collector configuration file path.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());
    let settings = Settings::with_env_and_config_file(args.flag_config.as_deref())?;
    init_logging(!settings.human_logs).expect("logging failed to initialize");
    debug!("Starting up...");

    let metrics = qan_common::metrics_from_opts(
        "qan-collector",
        settings.statsd_host.as_deref(),
        settings.statsd_port,
    )?;
    let sink: Arc<dyn LogsSink> = Arc::new(StdoutJsonSink::new());

    let mut handles: Vec<SchedulerHandle> = Vec::new();

    if settings.mysql.enabled {
        handles.push(spawn_mysql(&settings, sink.clone(), metrics.clone()).await?);
    }
    if settings.postgresql.enabled {
        handles.push(spawn_postgres(&settings, sink.clone(), metrics.clone()).await?);
    }

    info!("qan-collector running"; "banner" => settings.banner());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    for handle in handles {
        handle.stop().await;
    }

    info!("qan-collector closing");
    logging::reset_logging();
    Ok(())
}

async fn spawn_mysql(
    settings: &Settings,
    sink: Arc<dyn LogsSink>,
    metrics: qan_common::Metrics,
) -> Result<SchedulerHandle, Box<dyn Error>> {
    let mysql = &settings.mysql;
    let id = instance_id(Family::Mysql, &mysql.endpoint, &mysql.database);
    let database_url = qan_mysql::database_url(
        &mysql.endpoint,
        &mysql.username,
        &mysql.password,
        &mysql.database,
    );
    let pool = qan_mysql::build_pool(&database_url)?;
    let fetcher = MySQLFetcher::new(id.clone(), pool.clone());

    let pipeline = if mysql.is_adaptive() {
        let base_interval = Duration::from_secs(mysql.adaptive.base_interval);
        let governor = AdaptiveGovernor::new(base_interval, mysql.adaptive.state_directory());
        let load_probe = LoadProbe::new(pool);
        MysqlPipeline::adaptive(id, fetcher, sink, metrics, governor, load_probe)
    } else {
        let interval = match mysql.collection_interval {
            CollectionInterval::Fixed(secs) => Duration::from_secs(secs),
            CollectionInterval::Adaptive => Duration::from_secs(1),
        };
        MysqlPipeline::fixed(id, fetcher, sink, metrics, interval)
    };

    Ok(qan_scheduler::spawn(pipeline))
}

async fn spawn_postgres(
    settings: &Settings,
    sink: Arc<dyn LogsSink>,
    metrics: qan_common::Metrics,
) -> Result<SchedulerHandle, Box<dyn Error>> {
    let postgresql = &settings.postgresql;
    let id = instance_id(Family::Postgresql, &postgresql.endpoint, &postgresql.database);
    let database_url = qan_postgres::database_url(
        &postgresql.endpoint,
        &postgresql.username,
        &postgresql.password,
        &postgresql.database,
    );
    let pool = qan_postgres::build_pool(&database_url)?;
    let fetcher = PostgresFetcher::new(id.clone(), pool);
    let interval = Duration::from_secs(postgresql.collection_interval);

    let pipeline = PostgresPipeline::new(id, fetcher, sink, metrics, interval);
    Ok(qan_scheduler::spawn(pipeline))
}
