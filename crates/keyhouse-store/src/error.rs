//! Storage Error Types
//!
//! ## Error Categories
//!
//! ### Lookup Errors
//! - `NotFound`: the key was never written
//! - `TypeMismatch`: the stored type tag differs from the requested one
//!
//! ### Data Integrity Errors
//! - `Corrupt`: a segment file failed recovery; names the offending path.
//!   Recovery never silently truncates — the operator must intervene.
//! - `Codec`: a record failed to decode during a steady-state read. This
//!   fails that request only; the segment and its index stay usable.
//!
//! ### Lifecycle Errors
//! - `Io`: underlying file operation failed
//! - `Closed`: the store was closed; no further operations may begin
//!
//! All operations return `Result<T>` aliased to `Result<T, Error>`.

use std::path::PathBuf;

use keyhouse_core::ValueKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("record does not exist")]
    NotFound,

    #[error("stored value is {actual:?}, requested {expected:?}")]
    TypeMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("corrupt segment {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: keyhouse_core::Error,
    },

    #[error("codec error: {0}")]
    Codec(#[from] keyhouse_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
