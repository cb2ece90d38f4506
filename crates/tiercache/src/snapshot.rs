//! Snapshot persistence for [`BoundedCache`]
//!
//! Document layout (JSON):
//! ```text
//! {
//!   "capacity": <integer>,
//!   "policy": "count" | "size",          // optional, defaults to "count"
//!   "entries": [ {"key": K, "value": V}, ... ],   // least -> most recent
//!   "metrics": {"hits": n, "misses": n, "evictions": n}
//! }
//! ```
//!
//! Entry order is the recency order; loading replays the entries in that
//! order so the restored cache evicts exactly as the saved one would.

use std::fs;
use std::hash::Hash;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::cache::{BoundedCache, Entry};
use crate::error::{Error, Result};
use crate::lru::OrderedStore;
use crate::policy::{Policy, PolicyKind};
use crate::stats::Metrics;

#[derive(Serialize, Deserialize)]
struct Snapshot<K, V> {
    capacity: usize,
    #[serde(default)]
    policy: PolicyKind,
    entries: Vec<SnapshotEntry<K, V>>,
    metrics: SnapshotMetrics,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry<K, V> {
    key: K,
    value: V,
}

/// Signed on the wire so a negative counter is caught by validation
/// rather than surfacing as a parse error.
#[derive(Serialize, Deserialize)]
struct SnapshotMetrics {
    hits: i64,
    misses: i64,
    evictions: i64,
}

impl From<&Metrics> for SnapshotMetrics {
    fn from(metrics: &Metrics) -> Self {
        Self {
            hits: saturating_i64(metrics.hits()),
            misses: saturating_i64(metrics.misses()),
            evictions: saturating_i64(metrics.evictions()),
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Serialize the full cache state
    ///
    /// Holds the lock for the duration, so the snapshot is consistent.
    pub fn dump(&self) -> Result<Vec<u8>>
    where
        K: Serialize,
        V: Serialize,
    {
        let inner = self.inner.lock();

        let snapshot = Snapshot {
            capacity: self.capacity,
            policy: self.policy.kind(),
            entries: inner
                .store
                .iter()
                .map(|(key, entry)| SnapshotEntry {
                    key,
                    value: &entry.value,
                })
                .collect(),
            metrics: SnapshotMetrics::from(&inner.metrics),
        };

        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Rebuild a cache from [`dump`](Self::dump) output
    ///
    /// Size snapshots are measured with [`json_size`](crate::json_size);
    /// use [`from_bytes_with_policy`](Self::from_bytes_with_policy) for a
    /// custom sizer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        K: DeserializeOwned,
        V: Serialize + DeserializeOwned + 'static,
    {
        let snapshot: Snapshot<K, V> = serde_json::from_slice(bytes)?;
        let policy = match snapshot.policy {
            PolicyKind::Count => Policy::Count,
            PolicyKind::Size => Policy::size(),
        };
        Self::restore(snapshot, policy)
    }

    /// Rebuild a cache, charging entries with the given policy
    ///
    /// The policy must be of the kind recorded in the snapshot.
    pub fn from_bytes_with_policy(bytes: &[u8], policy: Policy<V>) -> Result<Self>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let snapshot: Snapshot<K, V> = serde_json::from_slice(bytes)?;
        Self::restore(snapshot, policy)
    }

    /// Write a snapshot to a file
    ///
    /// The snapshot is taken under the lock; the file is written after
    /// releasing it, through a temp file renamed into place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        let path = path.as_ref();
        let bytes = self.dump()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(path = ?path, bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Read a snapshot file written by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        K: DeserializeOwned,
        V: Serialize + DeserializeOwned + 'static,
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let cache = Self::from_bytes(&bytes)?;

        debug!(path = ?path, entries = cache.len(), "snapshot loaded");
        Ok(cache)
    }

    fn restore(snapshot: Snapshot<K, V>, policy: Policy<V>) -> Result<Self> {
        let capacity = snapshot.capacity;
        if capacity == 0 {
            return Err(Error::Validation("capacity must be positive".to_string()));
        }

        if snapshot.policy != policy.kind() {
            return Err(Error::Validation(format!(
                "snapshot policy {:?} does not match {:?}",
                snapshot.policy,
                policy.kind()
            )));
        }

        let metrics = Metrics::from_counts(
            non_negative("hits", snapshot.metrics.hits)?,
            non_negative("misses", snapshot.metrics.misses)?,
            non_negative("evictions", snapshot.metrics.evictions)?,
        );

        let mut store = OrderedStore::with_capacity(snapshot.entries.len());
        let mut usage: usize = 0;

        for SnapshotEntry { key, value } in snapshot.entries {
            if store.contains(&key) {
                return Err(Error::Validation("duplicate key in entries".to_string()));
            }

            let size = policy.measure(&value);
            usage = usage.saturating_add(size);
            store.insert_or_update(key, Entry { value, size });
        }

        if usage > capacity {
            return Err(Error::Validation(format!(
                "entries use {} units, capacity is {}",
                usage, capacity
            )));
        }

        Ok(Self::from_parts(capacity, policy, store, usage, metrics))
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::Validation(format!("metric {} is negative ({})", name, value)))
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
