//! Record Model and Wire Codec
//!
//! A record is one `(key, value)` pair written to a segment file. Values are
//! typed: a record stores either UTF-8 text or a signed 64-bit integer, and
//! the type tag travels with the record so a reader gets the integer back as
//! an integer regardless of its lexical form.
//!
//! ## Wire Format
//!
//! Records are self-framing; a reader needs no external length to walk a
//! file. All integers are big-endian:
//!
//! ```text
//! ┌───────────┬──────────┬────────┬──────────┬─────────┬───────────┐
//! │ Frame Len │ CRC32    │ Kind   │ Key Len  │ Key     │ Value     │
//! │ (4 bytes) │(4 bytes) │(1 byte)│(4 bytes) │(N bytes)│(M bytes)  │
//! └───────────┴──────────┴────────┴──────────┴─────────┴───────────┘
//! ```
//!
//! `Frame Len` counts everything after itself. The CRC32 covers
//! `Kind..Value`. An `Int64` value is a fixed 8-byte payload; a `Str` value
//! is raw UTF-8 with no terminator.
//!
//! ## Round-trip Law
//!
//! For any record `r`: `Record::decode(&mut r.encode()?)` yields `r` back
//! together with the exact number of bytes the encoder produced.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fixed bytes in every frame after the length field: CRC32 (4) + kind (1)
/// + key length (4).
const FRAME_FIXED: u32 = 9;

/// Type tag stored with every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueKind {
    Str = 0,
    Int64 = 1,
}

impl TryFrom<u8> for ValueKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ValueKind::Str),
            1 => Ok(ValueKind::Int64),
            other => Err(Error::InvalidKind(other)),
        }
    }
}

/// A typed record value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int64(i64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int64(_) => ValueKind::Int64,
        }
    }

    /// Length of the value payload on the wire.
    fn payload_len(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::Int64(_) => 8,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

/// A single key-value record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Total size of the encoded frame in bytes.
    pub fn encoded_len(&self) -> usize {
        4 + FRAME_FIXED as usize + self.key.len() + self.value.payload_len()
    }

    /// Encode this record into a self-framing byte sequence.
    pub fn encode(&self) -> Result<Bytes> {
        if self.key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let mut body = BytesMut::with_capacity(self.encoded_len() - 8);
        body.put_u8(self.value.kind() as u8);
        body.put_u32(self.key.len() as u32);
        body.put_slice(self.key.as_bytes());
        match &self.value {
            Value::Str(s) => body.put_slice(s.as_bytes()),
            Value::Int64(n) => body.put_i64(*n),
        }

        let mut frame = BytesMut::with_capacity(self.encoded_len());
        frame.put_u32(4 + body.len() as u32);
        frame.put_u32(crc32fast::hash(&body));
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    /// Decode one record from the front of `buf`, returning it together with
    /// the number of bytes consumed.
    ///
    /// Returns `Error::EndOfStream` when `buf` is empty (a clean frame
    /// boundary); any other error means the bytes are not a valid record.
    pub fn decode(buf: &mut impl Buf) -> Result<(Record, usize)> {
        if !buf.has_remaining() {
            return Err(Error::EndOfStream);
        }
        if buf.remaining() < 4 {
            return Err(Error::Truncated);
        }

        let frame_len = buf.get_u32();
        if frame_len < FRAME_FIXED {
            return Err(Error::InvalidFrame(format!(
                "frame length {} below minimum {}",
                frame_len, FRAME_FIXED
            )));
        }
        if (buf.remaining() as u64) < frame_len as u64 {
            return Err(Error::Truncated);
        }

        let stored_crc = buf.get_u32();
        let body = buf.copy_to_bytes(frame_len as usize - 4);
        if crc32fast::hash(&body) != stored_crc {
            return Err(Error::CrcMismatch);
        }

        let mut cursor = &body[..];
        let kind = ValueKind::try_from(cursor.get_u8())?;
        let key_len = cursor.get_u32() as usize;
        if cursor.remaining() < key_len {
            return Err(Error::InvalidFrame(format!(
                "key length {} exceeds frame body",
                key_len
            )));
        }
        let key = String::from_utf8(cursor.copy_to_bytes(key_len).to_vec())?;
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let value = match kind {
            ValueKind::Int64 => {
                if cursor.remaining() != 8 {
                    return Err(Error::InvalidFrame(format!(
                        "int64 payload must be 8 bytes, found {}",
                        cursor.remaining()
                    )));
                }
                Value::Int64(cursor.get_i64())
            }
            ValueKind::Str => {
                let raw = cursor.copy_to_bytes(cursor.remaining()).to_vec();
                Value::Str(String::from_utf8(raw).map_err(|_| {
                    Error::InvalidFrame("string value is not valid UTF-8".to_string())
                })?)
            }
        };

        Ok((Record { key, value }, 4 + frame_len as usize))
    }
}
