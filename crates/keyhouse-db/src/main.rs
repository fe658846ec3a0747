//! Keyhouse DB Node
//!
//! Binary entry point for the store's HTTP adapter. Opens (or recovers) the
//! segment directory, serves `/db/{key}`, and closes the store cleanly on
//! SIGINT/SIGTERM.
//!
//! Logging is controlled via `RUST_LOG` (default: `info`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use keyhouse_db::{router, AppState};
use keyhouse_store::{Store, StoreConfig};

#[derive(Parser)]
#[command(name = "keyhouse-db")]
#[command(about = "Persistent key-value store node", long_about = None)]
struct Args {
    /// Path to the database directory
    #[arg(long, default_value = "/var/lib/db/data")]
    path: PathBuf,

    /// Segment size threshold in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    size: u64,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let store = Arc::new(
        Store::open(StoreConfig::new(&args.path, args.size)).await?,
    );
    let app = router(AppState {
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(port = args.port, path = %args.path.display(), "db node listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await?;
    tracing::info!("db node shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
