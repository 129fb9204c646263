//! # lock-reconciler
//!
//! Runs the lock reconciler for one station against its SQLite store until
//! Ctrl-C (or SIGTERM on unix).
//!
//! ## Usage
//! ```text
//! lock-reconciler [path/to/station.toml]
//!
//! RUST_LOG=debug lock-reconciler
//! TALLY_STATION_ID=st-2 TALLY_DATABASE_URL=sqlite://tally.db lock-reconciler
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tally_db::{DbConfig, SqliteStore};
use tally_station::{LockCoordinator, Reconciler, ReconcilerConfig, StationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = StationConfig::load(std::env::args().nth(1).map(PathBuf::from))?;
    info!(
        station = %config.station.id,
        store = %config.store.id,
        is_main = config.station.is_main,
        "Configuration loaded"
    );

    let store = SqliteStore::new(
        DbConfig::new(config.database.url.clone()).max_connections(config.database.max_connections),
    )
    .await?;
    let locks = LockCoordinator::new(Arc::new(store.clone()), config.store.id.clone());

    let (handle, task) = Reconciler::new(locks, ReconcilerConfig::from_station(&config)).start();

    shutdown_signal().await;
    handle.shutdown().await?;
    task.await?;
    store.close().await;

    info!("Lock reconciler shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise info, with debug for the station crate.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally_station=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
