//! Postgres pool construction

use std::time::Duration;

use carelink_core::config::DEFAULT_MAX_CONNECTIONS;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Requests waiting this long for a free connection fail instead of hanging.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connect with `max_connections`; fails if the first connection does.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    tracing::debug!(max_connections, "connecting to database");
    options(max_connections).connect(database_url).await
}

/// Connect with the default pool size.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    connect(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Pool that connects on first use. Only the URL is validated up front.
pub fn create_lazy_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    options(DEFAULT_MAX_CONNECTIONS).connect_lazy(database_url)
}
