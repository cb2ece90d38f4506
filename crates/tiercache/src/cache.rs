//! BoundedCache: LRU cache with count- or size-based admission

use std::hash::Hash;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::lru::OrderedStore;
use crate::policy::{Policy, PolicyKind};
use crate::stats::{CacheStats, Metrics};

/// Result of [`BoundedCache::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PutOutcome {
    /// New key stored
    Inserted,
    /// Existing key overwritten
    Updated,
    /// Entry larger than the whole capacity; nothing changed
    Rejected,
}

impl PutOutcome {
    /// Whether the entry is now in the cache
    pub fn accepted(self) -> bool {
        !matches!(self, PutOutcome::Rejected)
    }
}

/// Stored value plus the units it was charged
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) size: usize,
}

/// Everything guarded by the cache lock
pub(crate) struct Inner<K, V> {
    pub(crate) store: OrderedStore<K, Entry<V>>,
    /// Sum of entry sizes; equals `store.len()` under the count policy
    pub(crate) usage: usize,
    pub(crate) metrics: Metrics,
}

/// Thread-safe LRU cache bounded by entry count or total size
///
/// All state sits behind one mutex. Every public operation takes it on
/// entry and holds it until it returns, so capacity checks, reordering
/// and counter updates never interleave.
///
/// ```
/// use tiercache::BoundedCache;
///
/// let cache = BoundedCache::new(2).unwrap();
/// cache.put(1, "a");
/// cache.put(2, "b");
/// cache.put(3, "c");
///
/// assert_eq!(cache.get(&1), None);
/// assert_eq!(cache.get(&3), Some("c"));
/// assert_eq!(cache.stats().evictions, 1);
/// ```
pub struct BoundedCache<K, V> {
    pub(crate) inner: Mutex<Inner<K, V>>,
    pub(crate) capacity: usize,
    pub(crate) policy: Policy<V>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries
    ///
    /// # Returns
    /// * `Result<BoundedCache>` - `Error::InvalidCapacity` if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_policy(capacity, Policy::Count)
    }

    /// Create a cache holding at most `max_bytes`, measured by
    /// [`json_size`](crate::json_size)
    pub fn with_size_limit(max_bytes: usize) -> Result<Self>
    where
        V: Serialize + 'static,
    {
        Self::with_policy(max_bytes, Policy::size())
    }

    /// Create a cache with an explicit admission policy
    ///
    /// # Arguments
    /// * `capacity` - Maximum entries (count policy) or bytes (size policy)
    /// * `policy` - How each entry is charged against `capacity`
    pub fn with_policy(capacity: usize, policy: Policy<V>) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        Ok(Self::from_parts(
            capacity,
            policy,
            OrderedStore::with_capacity(initial_slots(capacity)),
            0,
            Metrics::new(),
        ))
    }

    pub(crate) fn from_parts(
        capacity: usize,
        policy: Policy<V>,
        store: OrderedStore<K, Entry<V>>,
        usage: usize,
        metrics: Metrics,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store,
                usage,
                metrics,
            }),
            capacity,
            policy,
        }
    }

    /// Get a value, marking it most recently used
    ///
    /// Counts one hit or one miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.store.lookup(key) {
            Some(entry) => {
                let value = entry.value.clone();
                inner.metrics.record_hit();
                Some(value)
            }
            None => {
                inner.metrics.record_miss();
                None
            }
        }
    }

    /// Insert or overwrite a value, evicting least recently used entries
    /// until it fits
    ///
    /// An entry whose size alone exceeds the capacity is refused and the
    /// cache is left exactly as it was, including any older value stored
    /// under the same key.
    pub fn put(&self, key: K, value: V) -> PutOutcome {
        // Capacity and policy never change, so the admission check needs no lock
        let size = self.policy.measure(&value);
        if size > self.capacity {
            debug!(size, capacity = self.capacity, "entry rejected: larger than capacity");
            return PutOutcome::Rejected;
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // Take the old entry out first so the eviction loop can never
        // pick the key being written.
        let outcome = match inner.store.remove(&key) {
            Some(old) => {
                inner.usage -= old.size;
                PutOutcome::Updated
            }
            None => PutOutcome::Inserted,
        };

        // usage <= capacity holds here, so the subtraction cannot underflow
        while size > self.capacity - inner.usage {
            match inner.store.remove_least_recent() {
                Some((_, evicted)) => {
                    inner.usage -= evicted.size;
                    inner.metrics.record_eviction();
                    trace!(
                        size = evicted.size,
                        usage = inner.usage,
                        "evicted least recent entry"
                    );
                }
                None => break,
            }
        }

        inner.store.insert_or_update(key, Entry { value, size });
        inner.usage += size;

        outcome
    }

    /// Remove a key
    ///
    /// Explicit removal is not counted as an eviction.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let entry = inner.store.remove(key)?;
        inner.usage -= entry.size;
        Some(entry.value)
    }

    /// Check if a key is cached, without touching order or counters
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().store.contains(key)
    }

    /// Copy of all entries from least to most recently used
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner
            .lock()
            .store
            .iter()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect()
    }

    /// Drop every entry (counters are kept)
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.store.clear();
        inner.usage = 0;
    }

    /// Reset hit, miss and eviction counters
    pub fn reset_stats(&self) {
        self.inner.lock().metrics.reset();
    }

    /// Snapshot of counters and usage
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();

        CacheStats {
            hits: inner.metrics.hits(),
            misses: inner.metrics.misses(),
            evictions: inner.metrics.evictions(),
            hit_ratio: inner.metrics.hit_ratio(),
            current_usage: inner.usage,
            capacity: self.capacity,
            entries: inner.store.len(),
            policy: self.policy.kind(),
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().store.is_empty()
    }

    /// Units currently charged against the capacity
    pub fn current_usage(&self) -> usize {
        self.inner.lock().usage
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admission policy
    pub fn policy(&self) -> &Policy<V> {
        &self.policy
    }

    /// Admission policy tag
    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }
}

/// Slots to reserve up front: the whole capacity for count caches of
/// modest size, a small fixed amount otherwise.
fn initial_slots(capacity: usize) -> usize {
    capacity.min(1024)
}
