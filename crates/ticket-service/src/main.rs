//! `ticketd`: ticket lifecycle & SLA service
//!
//! # Usage
//!
//! ```bash
//! # In-memory store, users and teams seeded from the config file
//! ticketd --config ticketd.toml
//!
//! # RocksDB persistence (build with --features persistent)
//! TICKETD_DATA_DIR=/var/lib/ticketd ticketd --bind 0.0.0.0:8080
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lifecycle::{MemoryStore, SharedStore, TicketService};
use ticket_service::{router, AppState, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config (overrides TICKETD_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides TICKETD_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// RocksDB directory (overrides TICKETD_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Skip the background SLA sweep
    #[arg(long, default_value_t = false)]
    no_sweep: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ticketd=info".parse()?)
                .add_directive("lifecycle=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServiceConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_env_overrides();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = args.data_dir {
        config.server.data_dir = Some(dir);
    }
    config.validate().context("Invalid configuration")?;

    let store = open_store(&config)?;
    let service = TicketService::new(config.engine.clone(), store)
        .context("Failed to build ticket service")?;
    service
        .seed_directory()
        .context("Failed to seed user directory")?;
    let service = service.shared();

    let cancel = CancellationToken::new();
    let sweep_handle = if config.engine.sweep.enabled && !args.no_sweep {
        let sweeper = service.sweeper();
        let interval = config.engine.sweep.interval();
        Some(tokio::spawn(sweeper.run(interval, cancel.clone())))
    } else {
        info!("SLA sweep disabled");
        None
    };

    let app = router(AppState::new(service), config.server.request_timeout());
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "ticketd listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl-C handler");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "SLA sweeper task ended abnormally");
        }
    }
    info!("ticketd stopped");
    Ok(())
}

#[cfg(feature = "persistent")]
fn open_store(config: &ServiceConfig) -> Result<SharedStore> {
    match &config.server.data_dir {
        Some(dir) => {
            let store = lifecycle::store::RocksStore::open(dir)
                .with_context(|| format!("Failed to open RocksDB at {}", dir.display()))?;
            info!(path = %dir.display(), "Using RocksDB store");
            Ok(Arc::new(store))
        }
        None => Ok(memory_store()),
    }
}

#[cfg(not(feature = "persistent"))]
fn open_store(config: &ServiceConfig) -> Result<SharedStore> {
    if let Some(dir) = &config.server.data_dir {
        warn!(
            path = %dir.display(),
            "Data dir ignored: built without the `persistent` feature"
        );
    }
    Ok(memory_store())
}

fn memory_store() -> SharedStore {
    warn!("Using in-memory store; tickets are lost on restart");
    Arc::new(MemoryStore::new())
}
