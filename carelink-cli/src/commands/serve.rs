//! `carelink serve` - HTTP API, realtime socket and chat assistant

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use carelink_core::Config;
use carelink_server::assistant::{Assistant, DbFunctions, GeminiClient};
use carelink_server::db::migrations;
use carelink_server::{run_server, AppState, AuthKeys, RealtimeHub, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides CARELINK_BIND / config file)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow any CORS origin regardless of configuration
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server until Ctrl+C / SIGTERM
pub async fn run_serve(args: ServeArgs, config: Config) -> Result<()> {
    let secret = config.secret_key()?;
    let keys = AuthKeys::new(secret, config.auth.token_ttl_hours).context("Invalid token lifetime")?;

    let pool = super::connect(&config).await?;
    migrations::run(&pool).await.context("Migration failed")?;

    let hub = RealtimeHub::default();
    let mut state = AppState::new(pool.clone(), hub.clone(), keys);

    if let Some(api_key) = config.chat.api_key.as_deref() {
        tracing::info!(model = %config.chat.model, "chat assistant enabled");
        let model = GeminiClient::new(api_key, config.chat.model.as_str(), config.chat.base_url.as_str());
        let functions = DbFunctions::new(pool, hub);
        state = state.with_assistant(Arc::new(Assistant::new(Arc::new(model), Arc::new(functions))));
    }

    let server_config = ServerConfig {
        bind_addr: args.bind.unwrap_or(config.server.bind),
        cors_permissive: args.cors_permissive || config.server.cors_permissive,
    };

    run_server(state, server_config).await.context("Server error")?;
    Ok(())
}
