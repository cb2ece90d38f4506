//! Property tests for the capacity invariant and LRU ordering.
//!
//! Run with: `cargo test --test properties`

use std::collections::VecDeque;

use proptest::prelude::*;
use tiercache::{BoundedCache, Policy, PutOutcome};

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Put(u8, u16),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..32).prop_map(Op::Get),
        (0u8..32, 0u16..600).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..32).prop_map(Op::Remove),
    ]
}

/// Straightforward LRU over a deque (front = least recent)
struct Model {
    capacity: usize,
    entries: VecDeque<(u8, u16)>,
    evictions: u64,
}

impl Model {
    fn usage(&self) -> usize {
        self.entries.iter().map(|(_, v)| *v as usize).sum()
    }

    fn take(&mut self, key: u8) -> Option<u16> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        self.entries.remove(pos).map(|(_, v)| v)
    }

    fn get(&mut self, key: u8) -> Option<u16> {
        let value = self.take(key)?;
        self.entries.push_back((key, value));
        Some(value)
    }

    fn put(&mut self, key: u8, value: u16) -> bool {
        if value as usize > self.capacity {
            return false;
        }
        self.take(key);
        while self.usage() + value as usize > self.capacity {
            if self.entries.pop_front().is_none() {
                break;
            }
            self.evictions += 1;
        }
        self.entries.push_back((key, value));
        true
    }
}

proptest! {
    #[test]
    fn size_cache_matches_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let cache = BoundedCache::with_policy(1000, Policy::size_with(|v: &u16| *v as usize)).unwrap();
        let mut model = Model { capacity: 1000, entries: VecDeque::new(), evictions: 0 };

        for op in ops {
            match op {
                Op::Get(k) => prop_assert_eq!(cache.get(&k), model.get(k)),
                Op::Put(k, v) => {
                    let outcome = cache.put(k, v);
                    prop_assert_eq!(outcome.accepted(), model.put(k, v));
                }
                Op::Remove(k) => prop_assert_eq!(cache.remove(&k), model.take(k)),
            }

            prop_assert!(cache.current_usage() <= cache.capacity());
            prop_assert_eq!(cache.current_usage(), model.usage());
        }

        let expected: Vec<_> = model.entries.iter().copied().collect();
        prop_assert_eq!(cache.entries(), expected);
        prop_assert_eq!(cache.stats().evictions, model.evictions);
    }

    #[test]
    fn count_cache_never_exceeds_capacity(
        capacity in 1usize..16,
        keys in prop::collection::vec(0u32..64, 1..300),
    ) {
        let cache = BoundedCache::new(capacity).unwrap();

        for key in keys {
            prop_assert_ne!(cache.put(key, key), PutOutcome::Rejected);
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.current_usage(), cache.len());
            prop_assert_eq!(cache.get(&key), Some(key));
        }
    }

    #[test]
    fn snapshot_round_trip_preserves_eviction_order(
        keys in prop::collection::vec(0u32..20, 1..50),
    ) {
        let cache = BoundedCache::new(8).unwrap();
        for key in &keys {
            cache.put(*key, key.to_string());
        }

        let loaded: BoundedCache<u32, String> = BoundedCache::from_bytes(&cache.dump().unwrap()).unwrap();
        prop_assert_eq!(loaded.entries(), cache.entries());

        // Fill both with fresh keys; they must evict identically
        for key in 100..108u32 {
            cache.put(key, String::new());
            loaded.put(key, String::new());
            prop_assert_eq!(loaded.entries(), cache.entries());
        }
    }
}
