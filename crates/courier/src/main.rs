//! # courier
//!
//! Courier messaging server binary — wires storage, credential resolution,
//! and the WebSocket server together and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use courier_auth::StoreTokenResolver;
use courier_server::config::ServerConfig;
use courier_server::events::handlers::register_builtin;
use courier_server::events::registry::EventRegistry;
use courier_server::metrics;
use courier_server::server::CourierServer;
use courier_store::Database;

/// Courier messaging server.
#[derive(Parser, Debug)]
#[command(name = "courier", about = "Courier real-time messaging server")]
struct Cli {
    /// Host to bind (overrides config file and env).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config file and env).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".courier").join("courier.db")
    }
}

/// Load the server config: file if given, then `COURIER_*` env overrides.
fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid config file: {}", path.display()))?
        }
        None => ServerConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Resolve the database path: CLI flag, then `COURIER_DB_PATH`, then
/// `~/.courier/courier.db`.
fn resolve_db_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var("COURIER_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(Cli::default_db_path)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("courier=debug,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let db_path = resolve_db_path(args.db_path);
    let db = Database::open(&db_path).context("failed to open database")?;

    // Connections authenticate against the credentials table; there is no
    // issuance route here, tokens are provisioned out of band.
    let resolver = Arc::new(StoreTokenResolver::new(db.clone()));

    let mut registry = EventRegistry::new();
    register_builtin(&mut registry);

    let metrics_handle = metrics::install_recorder();

    let server = CourierServer::new(config, db, resolver, registry, metrics_handle);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;

    tracing::info!("courier listening on http://{addr} (websocket at ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server.shutdown().drain(server.rooms(), None).await;
    let _ = handle.await;
    tracing::info!("shutdown complete");
    Ok(())
}
