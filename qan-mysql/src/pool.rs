use std::time::Duration;

use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncMysqlConnection;
use qan_common::QanError;

const DEFAULT_POOL_SIZE: usize = 1;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

pub type MysqlPool = Pool<AsyncMysqlConnection>;
pub type MysqlConn = Object<AsyncMysqlConnection>;

/// Builds the deadpool-backed async connection pool this fetcher's queries run through.
/// One pool per configured instance, constructed once at scheduler start and dropped
/// (closing every pooled connection) at scheduler stop, per §4.3's connection-management
/// rule.
pub fn build_pool(database_url: &str) -> Result<MysqlPool, QanError> {
    let manager = AsyncDieselConnectionManager::<AsyncMysqlConnection>::new(database_url);
    Pool::builder(manager)
        .max_size(DEFAULT_POOL_SIZE)
        .wait_timeout(Some(CONNECTION_TIMEOUT))
        .create_timeout(Some(CONNECTION_TIMEOUT))
        .build()
        .map_err(|e| QanError::query(format!("failed to build mysql pool: {}", e)))
}

pub async fn get_conn(pool: &MysqlPool) -> Result<MysqlConn, QanError> {
    pool.get()
        .await
        .map_err(|e| QanError::query(format!("failed to check out mysql connection: {}", e)))
}

pub fn database_url(
    endpoint: &str,
    username: &str,
    password: &str,
    database: &str,
) -> String {
    format!("mysql://{}:{}@{}/{}", username, password, endpoint, database)
}
