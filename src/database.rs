use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use crate::error::{VaultError, VaultResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Builds the r2d2 pool backing the record store.
pub fn create_pool(database_url: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}

/// Checks a connection out of the pool.
pub fn get_db_conn(pool: &DbPool) -> VaultResult<DbConn> {
    pool.get().map_err(|e| VaultError::Pool(e.to_string()))
}
