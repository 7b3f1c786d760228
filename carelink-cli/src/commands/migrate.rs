//! `carelink migrate`

use anyhow::{Context, Result};
use carelink_core::Config;
use carelink_server::db::migrations;

pub async fn run_migrate(config: Config) -> Result<()> {
    let pool = super::connect(&config).await?;
    migrations::run(&pool).await.context("Migration failed")?;

    let tables: Vec<&str> = migrations::table_names().collect();
    tracing::info!(tables = tables.len(), "schema up to date");
    println!("Schema up to date ({} tables: {})", tables.len(), tables.join(", "));
    Ok(())
}
