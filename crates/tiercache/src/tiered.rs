//! TieredCache: fast in-memory tier over a durable on-disk tier

use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tierdisk::{AccessSnapshot, DurableStore};
use tracing::{debug, warn};

use crate::cache::{BoundedCache, PutOutcome};
use crate::error::{Error, Result};
use crate::stats::CacheStats;

/// Two-tier cache: a [`BoundedCache`] in front of a [`DurableStore`]
///
/// Reads go to the fast tier first and fall through to the durable tier;
/// a durable hit is copied back into the fast tier (promotion). Writes go
/// to both tiers, fast first.
///
/// # Concurrency
///
/// Each tier is independently synchronized and this type adds no lock of
/// its own, so the miss/read/promote sequence in [`get`](Self::get) is not
/// atomic. If another thread `put`s the same key between the durable read
/// and the promotion, the promoted (older) value can overwrite the newer
/// one in the fast tier. The durable tier always keeps the newer value,
/// and the stale fast entry is replaced on the next `put` or eviction.
pub struct TieredCache<K, V> {
    fast: BoundedCache<K, V>,
    durable: DurableStore,
}

/// Combined statistics for both tiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredStats {
    /// Fast tier counters and usage
    pub fast: CacheStats,
    /// Durable tier counters
    pub durable: AccessSnapshot,
    /// Bytes held by durable records
    pub durable_size_bytes: u64,
    /// Lookups answered by either tier over all lookups that reached
    /// a final answer
    pub combined_hit_ratio: f64,
    /// Lookups issued against the fast tier
    pub total_requests: u64,
}

impl<K, V> TieredCache<K, V>
where
    K: Hash + Eq + Clone + Serialize,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Compose a fast tier and a durable tier
    pub fn new(fast: BoundedCache<K, V>, durable: DurableStore) -> Self {
        Self { fast, durable }
    }

    /// Look a key up in the fast tier, then the durable tier
    ///
    /// A durable hit is promoted into the fast tier under its usual
    /// admission rules: it may evict other entries, or be rejected if it
    /// is too large, and is returned either way.
    ///
    /// # Returns
    /// * `Ok(None)` - Neither tier holds the key
    /// * `Err(Error::Durable)` - The durable read failed
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.fast.get(key) {
            return Ok(Some(value));
        }

        let value: V = match self.durable.get(key)? {
            Some(value) => value,
            None => return Ok(None),
        };

        let outcome = self.fast.put(key.clone(), value.clone());
        debug!(?outcome, "promoted from durable tier");

        Ok(Some(value))
    }

    /// Write a value to both tiers, fast tier first
    ///
    /// # Returns
    /// * `Ok(outcome)` - Durable write done; `outcome` is what the fast
    ///   tier did (it may have rejected an oversized value)
    /// * `Err(Error::PartialWrite)` - The fast tier was already updated but
    ///   the durable write failed; nothing is rolled back
    pub fn put(&self, key: K, value: V) -> Result<PutOutcome> {
        let fast = self.fast.put(key.clone(), value.clone());

        if let Err(source) = self.durable.put(&key, &value) {
            warn!(error = %source, ?fast, "durable write failed");
            return Err(Error::PartialWrite { fast, source });
        }

        Ok(fast)
    }

    /// Remove a key from both tiers
    ///
    /// # Returns
    /// * `Result<bool>` - `true` if either tier held the key
    pub fn remove(&self, key: &K) -> Result<bool> {
        let in_fast = self.fast.remove(key).is_some();
        let in_durable = self.durable.remove(key)?;
        Ok(in_fast || in_durable)
    }

    /// Empty both tiers
    pub fn clear(&self) -> Result<()> {
        self.fast.clear();
        let removed = self.durable.clear()?;
        debug!(removed, "tiers cleared");
        Ok(())
    }

    /// Statistics for both tiers
    ///
    /// The combined hit ratio counts fast hits plus durable hits against
    /// every lookup that reached an answer (a fast hit, or a durable hit
    /// or miss).
    pub fn stats(&self) -> Result<TieredStats> {
        let fast = self.fast.stats();
        let durable = self.durable.stats();
        let durable_size_bytes = self.durable.total_size_bytes()?;

        let hits = fast.hits + durable.hits;
        let answered = hits + durable.misses;
        let combined_hit_ratio = if answered == 0 {
            0.0
        } else {
            hits as f64 / answered as f64
        };

        Ok(TieredStats {
            total_requests: fast.hits + fast.misses,
            fast,
            durable,
            durable_size_bytes,
            combined_hit_ratio,
        })
    }

    /// Fast tier
    pub fn fast(&self) -> &BoundedCache<K, V> {
        &self.fast
    }

    /// Durable tier
    pub fn durable(&self) -> &DurableStore {
        &self.durable
    }
}
