//! Health Prober
//!
//! One independent background task per backend. Every probe interval the
//! task issues `GET /health` against its backend with the configured
//! timeout; a 2xx response marks the backend alive, any other outcome
//! (non-2xx, network error, timeout) marks it not-alive. State transitions
//! are logged; the prober never adds or removes registry entries and sends
//! no cancellation to in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::{Backend, Registry};

/// Probe every backend once and update its liveness flag.
pub async fn probe_once(client: &reqwest::Client, backend: &Backend, scheme: &str) {
    let url = format!("{}://{}/health", scheme, backend.endpoint());
    let healthy = match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(err) => {
            debug!(backend = backend.endpoint(), error = %err, "health probe failed");
            false
        }
    };

    let was_alive = backend.set_alive(healthy).await;
    if was_alive != healthy {
        info!(
            backend = backend.endpoint(),
            alive = healthy,
            "backend health changed"
        );
    }
}

/// Spawn one probing loop per backend. The tasks run for the life of the
/// process; dropping the handles detaches them.
pub fn spawn_probers(
    registry: &Arc<Registry>,
    client: reqwest::Client,
    scheme: &'static str,
    interval: Duration,
) -> Vec<JoinHandle<()>> {
    registry
        .backends()
        .iter()
        .cloned()
        .map(|backend| {
            let client = client.clone();
            tokio::spawn(async move {
                loop {
                    probe_once(&client, &backend, scheme).await;
                    tokio::time::sleep(interval).await;
                }
            })
        })
        .collect()
}
