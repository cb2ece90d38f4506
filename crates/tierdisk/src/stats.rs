//! Access statistics for the durable store

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for durable store traffic
///
/// The store has no lock of its own, so these are atomics.
#[derive(Debug, Default)]
pub struct AccessStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
}

/// Point-in-time copy of [`AccessStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccessSnapshot {
    /// Reads that found a record
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Completed writes
    pub writes: u64,
    /// Records actually removed
    pub removals: u64,
    /// hits / (hits + misses), 0.0 before any read
    pub hit_ratio: f64,
}

impl AccessStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read that found a record
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a read that found nothing
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed write
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a removed record
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits(), self.misses())
    }

    /// Copy all counters
    pub fn snapshot(&self) -> AccessSnapshot {
        let hits = self.hits();
        let misses = self.misses();
        AccessSnapshot {
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            hit_ratio: ratio(hits, misses),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.removals.store(0, Ordering::Relaxed);
    }
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = AccessStats::new();

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_write();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.removals, 0);
        assert_eq!(stats.hit_ratio(), 2.0 / 3.0);
    }

    #[test]
    fn test_empty_ratio() {
        let stats = AccessStats::new();
        assert_eq!(stats.hit_ratio(), 0.0);
        assert_eq!(stats.snapshot().hit_ratio, 0.0);
    }

    #[test]
    fn test_stats_reset() {
        let stats = AccessStats::new();

        stats.record_hit();
        stats.record_miss();
        stats.record_removal();
        stats.reset();

        assert_eq!(stats.snapshot(), AccessSnapshot::default());
    }
}
