//! Balancer Configuration
//!
//! - **port**: TCP port the balancer listens on (default: 8090)
//! - **timeout_secs**: deadline for one full backend round-trip, applied to
//!   forwarded requests and health probes alike (default: 3)
//! - **probe_interval_secs**: sleep between health probes per backend
//!   (default: 10)
//! - **backends**: the fixed pool of `host:port` endpoints
//! - **trace**: include `lb-*` headers in responses
//! - **https**: talk to backends over HTTPS instead of HTTP

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Port the balancer listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout for one full backend round-trip, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between health probes for each backend.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Backend endpoints as `host:port`.
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,

    /// Whether to annotate responses with `lb-*` tracing headers.
    #[serde(default)]
    pub trace: bool,

    /// Whether backends speak HTTPS.
    #[serde(default)]
    pub https: bool,
}

impl BalancerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            probe_interval_secs: default_probe_interval_secs(),
            backends: default_backends(),
            trace: false,
            https: false,
        }
    }
}

fn default_port() -> u16 {
    8090
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_probe_interval_secs() -> u64 {
    10
}

fn default_backends() -> Vec<String> {
    vec![
        "server1:8080".to_string(),
        "server2:8080".to_string(),
        "server3:8080".to_string(),
    ]
}
