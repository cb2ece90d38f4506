//! # tierdisk
//!
//! Durable tier for TierCache: a filesystem-backed key-value store.
//!
//! ## Design
//! - One record file per key, named by the SHA-256 of the encoded key
//! - Keys and values encoded as JSON via serde
//! - Writes go through a temp file and an atomic rename, synced before
//!   `put` returns
//! - No eviction and no recency tracking; compose with `tiercache` for that

#![warn(missing_docs)]

mod error;
pub mod record;
mod stats;
mod store;

pub use error::{Error, Result};
pub use stats::{AccessSnapshot, AccessStats};
pub use store::DurableStore;
