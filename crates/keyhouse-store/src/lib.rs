//! Keyhouse Storage Engine
//!
//! A single-node persistent key-value store built from append-only segment
//! files. Each segment owns one file on disk plus an in-memory map from key
//! to the byte offset of the most recent record for that key. The store
//! keeps an ordered sequence of segments; only the newest accepts writes,
//! and reads scan newest to oldest so that later writes shadow earlier ones.
//!
//! Writes roll over to a fresh segment once the active one reaches the
//! configured size threshold, and `merge` rewrites the live value of every
//! key into a single compacted segment.

pub mod config;
pub mod error;
pub mod segment;
pub mod store;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use segment::Segment;
pub use store::Store;
