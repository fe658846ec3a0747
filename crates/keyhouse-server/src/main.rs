//! Keyhouse Application Server
//!
//! The replicated middle tier the balancer forwards to. It exposes:
//!
//! - `GET /health` — 200 `OK`, or 500 `FAILURE` when the
//!   `CONF_HEALTH_FAILURE=true` environment toggle is set (used by the
//!   integration harness to simulate a sick replica)
//! - `GET /api/v1/some-data?key=&type=` — looks the key up in the db node
//!   and relays the JSON answer; `CONF_RESPONSE_DELAY_SEC` injects an
//!   artificial delay for load-distribution experiments
//!
//! On startup the server writes today's date under its team key so the
//! data the endpoint serves exists from the first request.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "keyhouse-server")]
#[command(about = "Application server backed by the keyhouse db", long_about = None)]
struct Args {
    /// Server port
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the db node
    #[arg(long, default_value = "http://db:8080")]
    db_url: String,

    /// Key the startup date is written under
    #[arg(long, default_value = "kpi3-test")]
    team_key: String,
}

#[derive(Clone)]
struct AppState {
    client: reqwest::Client,
    db_url: String,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/some-data", get(some_data))
        .with_state(state)
}

async fn health() -> Response {
    let failing = std::env::var("CONF_HEALTH_FAILURE")
        .map(|v| v == "true")
        .unwrap_or(false);
    if failing {
        (StatusCode::INTERNAL_SERVER_ERROR, "FAILURE").into_response()
    } else {
        (StatusCode::OK, "OK").into_response()
    }
}

async fn some_data(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(delay) = configured_delay() {
        tokio::time::sleep(delay).await;
    }

    let Some(key) = params.get("key") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let value_type = params.get("type").map(String::as_str).unwrap_or("string");

    let url = format!("{}/db/{}?type={}", state.db_url, key, value_type);
    let upstream = match state.client.get(&url).send().await {
        Ok(upstream) => upstream,
        Err(err) => {
            error!(key, error = %err, "db lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match upstream.status() {
        StatusCode::NOT_FOUND => StatusCode::NOT_FOUND.into_response(),
        status if status.is_success() => match upstream.bytes().await {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(err) => {
                error!(key, error = %err, "failed to read db response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        status => {
            error!(key, %status, "db returned an error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn configured_delay() -> Option<Duration> {
    let secs: u64 = std::env::var("CONF_RESPONSE_DELAY_SEC").ok()?.parse().ok()?;
    (secs > 0 && secs < 300).then(|| Duration::from_secs(secs))
}

/// Seed today's date under the team key so `/api/v1/some-data` has data to
/// serve from the first request.
async fn load_startup_date(state: &AppState, team_key: &str) -> anyhow::Result<()> {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let url = format!("{}/db/{}", state.db_url, team_key);
    let response = state
        .client
        .post(&url)
        .json(&serde_json::json!({ "value": today }))
        .send()
        .await?;
    anyhow::ensure!(
        response.status().is_success(),
        "unexpected response status: {}",
        response.status()
    );
    info!(date = %today, key = team_key, "loaded startup date");
    Ok(())
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
    let state = AppState {
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?,
        db_url: args.db_url.clone(),
    };

    load_startup_date(&state, &args.team_key).await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, db_url = %args.db_url, "application server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("application server shut down gracefully");
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
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
