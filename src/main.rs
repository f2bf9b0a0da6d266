//! Parking server binary.
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!   Client Request     │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!   ───────────────────┼─▶│   net    │──▶│  framer  │──▶│  router   │  │
//!                      │  │ listener │   │(pipeline)│   │ + chain   │  │
//!                      │  └──────────┘   └──────────┘   └─────┬─────┘  │
//!                      │                                      ▼        │
//!   Client Response    │  ┌──────────┐                  ┌───────────┐  │
//!   ◀──────────────────┼──│assembler │◀─────────────────│  handler  │──┼──▶ pool ──▶ store
//!                      │  └──────────┘                  └───────────┘  │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use parking_server::config::{self, AppConfig};
use parking_server::http::middleware::StaticTokenStore;
use parking_server::lifecycle::{signals, Shutdown};
use parking_server::net::Listener;
use parking_server::store::{ConnectionPool, MemoryStore, PoolConfig};
use parking_server::{api, observability, HttpServer};

#[derive(Parser)]
#[command(name = "parking-server")]
#[command(about = "HTTP/1.1 API server for the parking management system", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    observability::logging::init_tracing(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "parking-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        pool_size = config.pool.size,
        idle_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = ConnectionPool::initialize(
        MemoryStore::new(),
        PoolConfig {
            size: config.pool.size,
            acquire_timeout: config.pool.acquire_timeout(),
        },
    )?;
    let tokens = Arc::new(StaticTokenStore::new(config.auth.tokens.clone()));
    let router = Arc::new(api::build_router(&config, pool.clone(), tokens)?);

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(&config, router);
    server.run(listener, shutdown).await?;

    pool.close();
    tracing::info!("Shutdown complete");
    Ok(())
}
