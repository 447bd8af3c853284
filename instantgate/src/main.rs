//! InstantGate server binary.
//!
//! Startup sequence: load configuration, initialize logging, open the
//! database pool, verify connectivity with a bounded ping, introspect the
//! catalog into the schema cache, optionally attach the Redis response
//! cache, then serve the API until ctrl-c.

mod api;
mod cache;
mod config;
mod logging;
mod security;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use instantgate_core::adapters::mysql::MySqlDialect;
use instantgate_core::adapters::Dialect;
use instantgate_core::error::{GateError, Result};
use instantgate_core::Introspector;
use tokio::net::TcpListener;

use crate::api::AppState;
use crate::cache::ResponseCache;
use crate::config::Config;

/// Instant REST API for any relational database
#[derive(Parser)]
#[command(name = "instantgate")]
#[command(about = "Serve an automatically derived REST API over a live database")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("instantgate: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose, cli.quiet)?;

    let database_url = config.database.url()?;
    let dialect = Arc::new(
        MySqlDialect::connect(&database_url, &config.database.connection_options()).await?,
    );

    // Fail fast when the database is unreachable at boot.
    tokio::time::timeout(
        Duration::from_secs(config.database.connect_timeout),
        dialect.ping(),
    )
    .await
    .map_err(|_| GateError::configuration("timed out pinging the database at startup"))??;

    let introspector = Introspector::new(dialect.clone());
    introspector.load_schema().await?;
    let schema = introspector.cache();

    tracing::info!(
        tables = schema.len(),
        database = %config.database.name,
        "catalog introspected"
    );

    let response_cache = match ResponseCache::connect(&config.redis).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(err) => {
            tracing::warn!(error = %err, "response cache unavailable, continuing without it");
            None
        }
    };

    let state = AppState::new(
        dialect.pool().clone(),
        schema,
        &config,
        response_cache,
    );
    let router = api::router(state, &config);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GateError::connect_failed(format!("failed to bind {addr}"), e))?;

    tracing::info!(port = config.server.port, "instantgate listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GateError::connect_failed("HTTP server terminated abnormally", e))?;

    tracing::info!("shutting down");
    dialect.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown signal handler");
    }
}
