//! Backend Registry
//!
//! A fixed-length, ordered list of backends built once at startup. The
//! list itself is immutable; only two fields on each entry ever change,
//! each behind its own synchronization:
//!
//! - `alive` sits behind a reader-writer lock, flipped by the health
//!   prober and by the dispatcher on transport failure
//! - `traffic` is an atomic counter of response bytes served; updates are
//!   additive, so the counter never decreases over the process lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

/// One upstream endpoint with its mutable bookkeeping.
pub struct Backend {
    endpoint: String,
    alive: RwLock<bool>,
    traffic: AtomicU64,
}

impl Backend {
    /// Backends start out alive; the first failed probe demotes them.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            alive: RwLock::new(true),
            traffic: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn is_alive(&self) -> bool {
        *self.alive.read().await
    }

    /// Set the liveness flag, returning the previous value so callers can
    /// log transitions.
    pub async fn set_alive(&self, alive: bool) -> bool {
        let mut guard = self.alive.write().await;
        std::mem::replace(&mut *guard, alive)
    }

    /// Cumulative response bytes served by this backend.
    pub fn traffic(&self) -> u64 {
        self.traffic.load(Ordering::Acquire)
    }

    /// Add served bytes to the counter, returning the new total.
    pub fn add_traffic(&self, bytes: u64) -> u64 {
        self.traffic.fetch_add(bytes, Ordering::AcqRel) + bytes
    }
}

/// The immutable backend list.
pub struct Registry {
    backends: Vec<Arc<Backend>>,
}

impl Registry {
    pub fn new(endpoints: impl IntoIterator<Item = String>) -> Self {
        Self {
            backends: endpoints
                .into_iter()
                .map(|endpoint| Arc::new(Backend::new(endpoint)))
                .collect(),
        }
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Pick the live backend with the smallest traffic counter. Ties go to
    /// the first candidate in registry order, so selection is stable.
    pub async fn select_least_traffic(&self) -> Option<Arc<Backend>> {
        let mut selected: Option<(u64, &Arc<Backend>)> = None;
        for backend in &self.backends {
            if !backend.is_alive().await {
                continue;
            }
            let traffic = backend.traffic();
            match selected {
                Some((min, _)) if traffic >= min => {}
                _ => selected = Some((traffic, backend)),
            }
        }
        selected.map(|(_, backend)| backend.clone())
    }
}
