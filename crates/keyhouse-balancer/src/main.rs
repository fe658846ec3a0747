//! Keyhouse Load Balancer
//!
//! Binary entry point. Builds the backend registry from flags, spawns one
//! health-probing task per backend, and serves the dispatcher until
//! SIGINT/SIGTERM.
//!
//! Logging is controlled via `RUST_LOG` (default: `info`).

use std::sync::Arc;

use clap::Parser;
use keyhouse_balancer::prober::spawn_probers;
use keyhouse_balancer::{router, BalancerConfig, BalancerState, Registry};

#[derive(Parser)]
#[command(name = "keyhouse-balancer")]
#[command(about = "Traffic-aware HTTP load balancer", long_about = None)]
struct Args {
    /// Load balancer port
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Request timeout in seconds
    #[arg(long = "timeout-sec", default_value_t = 3)]
    timeout_sec: u64,

    /// Seconds between health probes per backend
    #[arg(long = "probe-interval-sec", default_value_t = 10)]
    probe_interval_sec: u64,

    /// Comma-separated backend endpoints
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "server1:8080,server2:8080,server3:8080"
    )]
    backends: Vec<String>,

    /// Include tracing information in responses
    #[arg(long)]
    trace: bool,

    /// Whether backends support HTTPS
    #[arg(long)]
    https: bool,
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
    let config = BalancerConfig {
        port: args.port,
        timeout_secs: args.timeout_sec,
        probe_interval_secs: args.probe_interval_sec,
        backends: args.backends,
        trace: args.trace,
        https: args.https,
    };
    anyhow::ensure!(!config.backends.is_empty(), "no backends configured");

    let registry = Arc::new(Registry::new(config.backends.iter().cloned()));
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()?;

    let probers = spawn_probers(&registry, client.clone(), config.scheme(), config.probe_interval());

    let state = Arc::new(BalancerState {
        registry,
        client,
        scheme: config.scheme(),
        trace: config.trace,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        port = config.port,
        backends = config.backends.len(),
        trace = config.trace,
        "load balancer listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for prober in probers {
        prober.abort();
    }
    tracing::info!("load balancer shut down gracefully");
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
