//! Segmented Key-Value Store
//!
//! The store owns an ordered sequence of segments, oldest first. The last
//! segment is the **active** one and is the only segment that receives
//! writes; every other segment is sealed with a frozen index.
//!
//! ## Concurrency Model
//!
//! - `put` and `merge` serialize on a single writer lock; there is exactly
//!   one writer to the active segment at any time.
//! - `get` runs concurrently with writes. Readers snapshot the segment
//!   sequence under a read lock, so a rollover or merge that swaps the
//!   sequence never tears an in-flight read.
//! - `close` is terminal and idempotent; operations after close fail with
//!   `Error::Closed`.
//!
//! ## On-Disk Layout
//!
//! One directory of files named `<prefix>-<ordinal>`. Ordinals are
//! strictly increasing over the store's lifetime and gaps (left by merges)
//! are permitted; the numeric suffix ordering is authoritative. On open the
//! directory is scanned, segments are recovered in ordinal order, and the
//! highest ordinal becomes active.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyhouse_core::{Record, Value, ValueKind};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{Error, Result, Segment, StoreConfig};

pub struct Store {
    config: StoreConfig,

    /// Ordered segment sequence, oldest first; last is the active segment.
    segments: RwLock<Vec<Arc<Segment>>>,

    /// Serializes `put` and `merge`.
    write_lock: Mutex<()>,

    closed: AtomicBool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Store {
    /// Open a store over `config.dir`, recovering any segment files found
    /// there. Fails with `Error::Corrupt` if any segment fails recovery.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.dir).await?;

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&config.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ordinal) = Segment::parse_ordinal(&config.segment_prefix, name) {
                found.push((ordinal, entry.path()));
            }
        }
        found.sort_by_key(|(ordinal, _)| *ordinal);

        let mut segments = Vec::with_capacity(found.len().max(1));
        for (ordinal, path) in found {
            segments.push(Arc::new(Segment::recover(path, ordinal).await?));
        }
        if segments.is_empty() {
            segments.push(Arc::new(
                Segment::create(&config.dir, &config.segment_prefix, 0).await?,
            ));
        }

        info!(
            dir = %config.dir.display(),
            segments = segments.len(),
            active_ordinal = segments.last().map(|s| s.ordinal()),
            "store opened"
        );
        Ok(Self {
            config,
            segments: RwLock::new(segments),
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Look up the current value of `key`, requiring the stored type tag to
    /// match `kind`.
    ///
    /// Scans newest to oldest; the first segment whose index contains the
    /// key is authoritative.
    pub async fn get(&self, key: &str, kind: ValueKind) -> Result<Value> {
        self.ensure_open()?;
        let segments = self.segments.read().await.clone();
        for segment in segments.iter().rev() {
            if let Some(offset) = segment.lookup(key).await {
                let record = segment.read_at(offset).await?;
                if record.value.kind() != kind {
                    return Err(Error::TypeMismatch {
                        expected: kind,
                        actual: record.value.kind(),
                    });
                }
                return Ok(record.value);
            }
        }
        Err(Error::NotFound)
    }

    /// Write `value` under `key`.
    ///
    /// The size check runs after every write: once the active segment has
    /// reached the configured threshold it is sealed and a fresh segment
    /// with the next ordinal becomes active. An oversized record is still
    /// written; it just triggers rollover immediately.
    pub async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.ensure_open()?;
        let _writer = self.write_lock.lock().await;

        let active = self
            .segments
            .read()
            .await
            .last()
            .cloned()
            .ok_or(Error::Closed)?;
        active.append(&Record::new(key, value)).await?;

        if active.size() >= self.config.segment_max_size {
            let next = active.ordinal() + 1;
            let fresh =
                Segment::create(&self.config.dir, &self.config.segment_prefix, next).await?;
            self.segments.write().await.push(Arc::new(fresh));
            debug!(
                sealed_ordinal = active.ordinal(),
                sealed_bytes = active.size(),
                active_ordinal = next,
                "segment rolled over"
            );
        }
        Ok(())
    }

    /// Rewrite the live value of every key into a single compacted segment
    /// and discard all prior segments.
    ///
    /// Not atomic with respect to crashes: old files stay on disk until the
    /// final swap, so restart recovery sees either the old sequence, or the
    /// old sequence plus a (valid, append-only) partial output.
    pub async fn merge(&self) -> Result<()> {
        self.ensure_open()?;
        let _writer = self.write_lock.lock().await;

        let old = self.segments.read().await.clone();
        let next = old.last().map(|s| s.ordinal() + 1).ok_or(Error::Closed)?;
        let output = Arc::new(
            Segment::create(&self.config.dir, &self.config.segment_prefix, next).await?,
        );

        // Newest first: the first segment holding a key has its live value.
        let mut written: HashSet<String> = HashSet::new();
        for segment in old.iter().rev() {
            for (key, offset) in segment.index_snapshot().await {
                if written.contains(&key) {
                    continue;
                }
                let record = segment.read_at(offset).await?;
                output.append(&record).await?;
                written.insert(key);
            }
        }
        output.sync().await?;

        *self.segments.write().await = vec![output];
        for segment in &old {
            if let Err(err) = tokio::fs::remove_file(segment.path()).await {
                warn!(
                    path = %segment.path().display(),
                    error = %err,
                    "failed to remove merged segment file"
                );
            }
        }

        info!(
            segments_merged = old.len(),
            live_keys = written.len(),
            output_ordinal = next,
            "merge complete"
        );
        Ok(())
    }

    /// Flush and close every segment. Idempotent; any operation started
    /// after close fails with `Error::Closed`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for segment in self.segments.read().await.iter() {
            segment.sync().await?;
        }
        info!(dir = %self.config.dir.display(), "store closed");
        Ok(())
    }

    /// Number of segments currently in the sequence.
    pub async fn segment_count(&self) -> usize {
        self.segments.read().await.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}
