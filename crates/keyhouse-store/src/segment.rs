//! Append-Only Segment
//!
//! A segment owns exactly one file on disk together with an in-memory hash
//! index mapping each key to the byte offset of its most recent record
//! within that file. The file is a bare concatenation of encoded records —
//! no header, no trailer, no sidecar index; the index is rebuilt by
//! replaying the file on open.
//!
//! ## Ordering Invariant
//!
//! `append` makes the index entry visible only after the record bytes have
//! been handed to the file. A concurrent reader therefore either misses the
//! key (pre-put) or finds an offset pointing at a complete record
//! (post-put) — never a torn read. Every indexed offset is strictly less
//! than the current write offset.
//!
//! ## Handles
//!
//! Each segment keeps one long-lived append handle for its lifetime. Reads
//! open a transient handle, seek, decode one record, and release it on
//! every exit path.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Buf;
use keyhouse_core::Record;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{Error, Result};

pub struct Segment {
    path: PathBuf,
    ordinal: u64,

    /// Long-lived append handle. Writers are serialized by the store, but
    /// the lock also guards the file cursor against recovery-time use.
    file: Mutex<File>,

    /// key -> byte offset of the most recent record for that key.
    index: RwLock<HashMap<String, u64>>,

    /// Current file length in bytes; the offset the next append lands at.
    write_offset: AtomicU64,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("ordinal", &self.ordinal)
            .field(
                "write_offset",
                &self.write_offset.load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish()
    }
}

impl Segment {
    /// File name for a segment with the given ordinal.
    pub fn file_name(prefix: &str, ordinal: u64) -> String {
        format!("{}-{}", prefix, ordinal)
    }

    /// Parse the ordinal out of a segment file name, or `None` if the name
    /// does not match `<prefix>-<decimal>`.
    pub fn parse_ordinal(prefix: &str, name: &str) -> Option<u64> {
        name.strip_prefix(prefix)?
            .strip_prefix('-')?
            .parse::<u64>()
            .ok()
    }

    /// Create a fresh, empty segment file.
    pub async fn create(dir: &Path, prefix: &str, ordinal: u64) -> Result<Self> {
        let path = dir.join(Self::file_name(prefix, ordinal));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), ordinal, "created segment");
        Ok(Self {
            path,
            ordinal,
            file: Mutex::new(file),
            index: RwLock::new(HashMap::new()),
            write_offset: AtomicU64::new(0),
        })
    }

    /// Rebuild a segment from an existing file by replaying every record
    /// from offset 0.
    ///
    /// A clean end of file terminates the replay; anything else is fatal
    /// for this segment and surfaces as `Error::Corrupt` naming the path.
    pub async fn recover(path: PathBuf, ordinal: u64) -> Result<Self> {
        let data = tokio::fs::read(&path).await?;
        let mut index = HashMap::new();
        let mut offset = 0u64;
        let mut buf = &data[..];
        loop {
            match Record::decode(&mut buf) {
                Ok((record, consumed)) => {
                    index.insert(record.key, offset);
                    offset += consumed as u64;
                }
                Err(keyhouse_core::Error::EndOfStream) => break,
                Err(source) => return Err(Error::Corrupt { path, source }),
            }
        }

        let file = OpenOptions::new().append(true).open(&path).await?;
        debug!(
            path = %path.display(),
            ordinal,
            keys = index.len(),
            bytes = offset,
            "recovered segment"
        );
        Ok(Self {
            path,
            ordinal,
            file: Mutex::new(file),
            index: RwLock::new(index),
            write_offset: AtomicU64::new(offset),
        })
    }

    /// Append one record, returning the offset it was written at.
    ///
    /// The index entry is published only after the bytes are written; a
    /// failed write leaves the index unchanged.
    pub async fn append(&self, record: &Record) -> Result<u64> {
        let encoded = record.encode()?;
        let offset = {
            let mut file = self.file.lock().await;
            file.write_all(&encoded).await?;
            file.flush().await?;
            let offset = self.write_offset.load(Ordering::Acquire);
            self.write_offset
                .store(offset + encoded.len() as u64, Ordering::Release);
            offset
        };
        self.index.write().await.insert(record.key.clone(), offset);
        Ok(offset)
    }

    /// Decode the single record stored at `offset`.
    pub async fn read_at(&self, offset: u64) -> Result<Record> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf).await?;
        let frame_len = u32::from_be_bytes(len_buf);
        if offset + 4 + frame_len as u64 > self.size() {
            return Err(Error::Codec(keyhouse_core::Error::Truncated));
        }

        let mut frame = vec![0u8; 4 + frame_len as usize];
        frame[..4].copy_from_slice(&len_buf);
        file.read_exact(&mut frame[4..]).await?;

        let mut buf: &[u8] = &frame;
        let (record, _) = Record::decode(&mut buf)?;
        debug_assert!(!buf.has_remaining());
        Ok(record)
    }

    /// Offset of the most recent record for `key`, if this segment holds it.
    pub async fn lookup(&self, key: &str) -> Option<u64> {
        self.index.read().await.get(key).copied()
    }

    /// Snapshot of the whole index, used by merge.
    pub async fn index_snapshot(&self) -> Vec<(String, u64)> {
        self.index
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Current file length in bytes.
    pub fn size(&self) -> u64 {
        self.write_offset.load(Ordering::Acquire)
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered writes through to disk.
    pub async fn sync(&self) -> Result<()> {
        self.file.lock().await.sync_all().await?;
        Ok(())
    }
}
