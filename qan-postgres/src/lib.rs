//! Postgres-specific QAN components: the `pg_stat_statements`-backed fetcher and the
//! pipeline that wires it into a `qan_scheduler::TickPipeline` at a fixed interval.

mod delta;
mod fetcher;
mod pipeline;
mod pool;
mod row;

pub use delta::diff_postgres;
pub use fetcher::PostgresFetcher;
pub use pipeline::PostgresPipeline;
pub use pool::{build_pool, database_url, PgPool};
pub use row::PostgresStatementRow;
