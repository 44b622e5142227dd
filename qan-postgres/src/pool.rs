use std::time::Duration;

use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use qan_common::QanError;

const DEFAULT_POOL_SIZE: usize = 1;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

pub type PgPool = Pool<AsyncPgConnection>;
pub type PgConn = Object<AsyncPgConnection>;

/// Mirrors `qan_mysql::pool::build_pool`: one pool per configured instance, built once at
/// scheduler start and closed at scheduler stop (§4.3).
pub fn build_pool(database_url: &str) -> Result<PgPool, QanError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder(manager)
        .max_size(DEFAULT_POOL_SIZE)
        .wait_timeout(Some(CONNECTION_TIMEOUT))
        .create_timeout(Some(CONNECTION_TIMEOUT))
        .build()
        .map_err(|e| QanError::query(format!("failed to build postgres pool: {}", e)))
}

pub async fn get_conn(pool: &PgPool) -> Result<PgConn, QanError> {
    pool.get()
        .await
        .map_err(|e| QanError::query(format!("failed to check out postgres connection: {}", e)))
}

pub fn database_url(endpoint: &str, username: &str, password: &str, database: &str) -> String {
    format!(
        "postgres://{}:{}@{}/{}",
        username, password, endpoint, database
    )
}
