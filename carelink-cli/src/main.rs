//! carelink CLI - care coordination backend
//!
//! Subcommands:
//! - `serve`: migrate, then run the HTTP + WebSocket server
//! - `migrate`: create missing tables and exit
//! - `seed`: load sample community resources or patient display content

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use carelink_core::Config;

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "carelink",
    author,
    version,
    about = "Care coordination backend: care records, patient display sync and a caregiver chat assistant"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: $CARELINK_CONFIG or ~/.carelink/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API and realtime server
    Serve(commands::serve::ServeArgs),
    /// Create any missing database tables
    Migrate,
    /// Load sample data
    Seed(commands::seed::SeedArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config).await?,
        Commands::Migrate => commands::run_migrate(config).await?,
        Commands::Seed(args) => commands::run_seed(args, config).await?,
    }
    Ok(())
}
