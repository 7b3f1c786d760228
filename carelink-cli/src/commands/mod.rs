//! Subcommand implementations

pub mod migrate;
pub mod seed;
pub mod serve;

pub use migrate::run_migrate;
pub use seed::run_seed;
pub use serve::run_serve;

use anyhow::{Context, Result};
use carelink_core::Config;
use carelink_server::db::{self, PgPool};

/// Connect using the configured URL and pool size.
pub(crate) async fn connect(config: &Config) -> Result<PgPool> {
    let url = config.database_url()?;
    db::connect(url, config.database.max_connections)
        .await
        .context("Failed to connect to database")
}
