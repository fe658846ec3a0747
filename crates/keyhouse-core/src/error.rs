//! Error Types for the Record Codec
//!
//! The decoder distinguishes two terminal conditions:
//!
//! - `EndOfStream`: the input ended exactly on a frame boundary. This is the
//!   normal way a segment replay terminates and is not a data error.
//! - Everything else (`Truncated`, `CrcMismatch`, `InvalidKind`,
//!   `InvalidFrame`, `InvalidKey`): the bytes cannot be a valid record. A
//!   caller replaying a file treats any of these as corruption.
//!
//! All codec functions return `Result<T>` aliased to `Result<T, Error>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("end of stream")]
    EndOfStream,

    #[error("truncated record frame")]
    Truncated,

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("invalid value kind: {0}")]
    InvalidKind(u8),

    #[error("invalid record frame: {0}")]
    InvalidFrame(String),

    #[error("key is not valid UTF-8")]
    InvalidKey(#[from] std::string::FromUtf8Error),

    #[error("record key must not be empty")]
    EmptyKey,
}

impl Error {
    /// True for every decode failure that indicates bad bytes rather than a
    /// clean end of input.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Error::EndOfStream)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
