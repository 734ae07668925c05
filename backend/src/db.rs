use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};

use crate::store::postgres::PgPool;

/// Builds the Postgres connection pool. Fails if no connection can be opened.
pub fn build_pool(database_url: &str, max_size: u32) -> Result<PgPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    match Pool::builder().max_size(max_size).build(manager) {
        Ok(pool) => {
            log::info!("Database pool established with up to {} connections", max_size);
            Ok(pool)
        }
        Err(e) => {
            log::error!("Failed to establish database pool: {}", e);
            Err(e)
        }
    }
}
