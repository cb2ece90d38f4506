//! # tiercache
//!
//! Bounded LRU cache with size-aware admission and an optional durable tier.
//!
//! ## Architecture
//! - **OrderedStore**: AHash index + doubly-linked recency list (O(1))
//! - **BoundedCache**: capacity in entries or bytes, one coarse lock,
//!   hit/miss/eviction counters, JSON snapshots
//! - **TieredCache**: BoundedCache in front of a `tierdisk::DurableStore`,
//!   read-through with promotion and write-through to both tiers
//!
//! ## Admission
//! Every entry is charged against the capacity: one unit under
//! [`Policy::Count`], its measured size under [`Policy::Size`]. An entry
//! that could never fit is rejected ([`PutOutcome::Rejected`]) instead of
//! flushing the whole cache.

#![warn(missing_docs)]

mod cache;
mod error;
pub mod lru;
mod policy;
mod snapshot;
mod stats;
mod tiered;

pub use cache::{BoundedCache, PutOutcome};
pub use error::{Error, Result};
pub use lru::OrderedStore;
pub use policy::{json_size, Policy, PolicyKind, Sizer};
pub use stats::{CacheStats, Metrics};
pub use tiered::{TieredCache, TieredStats};

pub use tierdisk::{AccessSnapshot, DurableStore};
