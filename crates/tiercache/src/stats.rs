//! Cache statistics tracking

use serde::Serialize;

use crate::policy::PolicyKind;

/// Hit, miss and eviction counters
///
/// Plain integers: they live under the owning cache's lock and are only
/// touched at the moment the event happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Metrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore counters from saved values
    pub fn from_counts(hits: u64, misses: u64, evictions: u64) -> Self {
        Self {
            hits,
            misses,
            evictions,
        }
    }

    /// Record a cache hit
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a cache miss
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record an entry evicted for capacity
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time view of a [`BoundedCache`](crate::BoundedCache)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups that found the key
    pub hits: u64,
    /// Lookups that did not
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_ratio: f64,
    /// Units in use: entry count or bytes, depending on `policy`
    pub current_usage: usize,
    /// Maximum units
    pub capacity: usize,
    /// Number of stored entries
    pub entries: usize,
    /// Admission policy
    pub policy: PolicyKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let mut metrics = Metrics::new();

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_eviction();

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.evictions(), 1);
        assert_eq!(metrics.hit_ratio(), 2.0 / 3.0);
    }

    #[test]
    fn test_hit_ratio_without_requests() {
        let metrics = Metrics::new();
        assert_eq!(metrics.hit_ratio(), 0.0);
    }

    #[test]
    fn test_metrics_reset() {
        let mut metrics = Metrics::from_counts(5, 3, 2);
        metrics.reset();

        assert_eq!(metrics, Metrics::new());
        assert_eq!(metrics.hit_ratio(), 0.0);
    }
}
