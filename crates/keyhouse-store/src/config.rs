//! Store Configuration
//!
//! Controls where segment files live and when the active segment rolls:
//!
//! - **dir**: directory holding the segment files
//! - **segment_max_size**: once the active segment reaches this many bytes,
//!   the next write goes to a fresh segment (default: 10 MiB). A single
//!   record larger than the threshold is still written; it triggers
//!   rollover immediately afterwards.
//! - **segment_prefix**: file-name prefix; segments are named
//!   `<prefix>-<ordinal>` (default: `segment`)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the segment files.
    pub dir: PathBuf,

    /// Roll the active segment once it reaches this size in bytes.
    #[serde(default = "default_segment_max_size")]
    pub segment_max_size: u64,

    /// Segment file-name prefix.
    #[serde(default = "default_segment_prefix")]
    pub segment_prefix: String,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>, segment_max_size: u64) -> Self {
        Self {
            dir: dir.into(),
            segment_max_size,
            segment_prefix: default_segment_prefix(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/db"),
            segment_max_size: default_segment_max_size(),
            segment_prefix: default_segment_prefix(),
        }
    }
}

fn default_segment_max_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_segment_prefix() -> String {
    "segment".to_string()
}
