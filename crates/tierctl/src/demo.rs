//! Behavioural walkthroughs of the cache, printed step by step

use std::sync::Arc;
use std::thread;

use anyhow::{ensure, Result};
use clap::ValueEnum;
use tempfile::TempDir;
use tiercache::{BoundedCache, DurableStore, Policy, TieredCache};
use tracing::info;

/// Demo scenario selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Every scenario in order
    All,
    /// Puts, gets and one eviction
    Basic,
    /// Overwriting an existing key
    Update,
    /// A cache that holds a single entry
    CapacityOne,
    /// Lookups of absent keys
    MissingKey,
    /// Hit, miss and eviction counters
    Metrics,
    /// Save to a file and load it back
    Persistence,
    /// Many threads on one cache
    Concurrency,
    /// Byte-bounded cache with rejection
    SizePolicy,
    /// Memory tier over a disk tier
    Tiered,
}

const ORDER: [Scenario; 9] = [
    Scenario::Basic,
    Scenario::Update,
    Scenario::CapacityOne,
    Scenario::MissingKey,
    Scenario::Metrics,
    Scenario::Persistence,
    Scenario::Concurrency,
    Scenario::SizePolicy,
    Scenario::Tiered,
];

/// Run one scenario, or all of them
pub fn run(scenario: Scenario) -> Result<()> {
    let selected: Vec<Scenario> = match scenario {
        Scenario::All => ORDER.to_vec(),
        one => vec![one],
    };

    for (i, scenario) in selected.into_iter().enumerate() {
        println!("Test {}: {:?}", i + 1, scenario);
        match scenario {
            Scenario::All => {}
            Scenario::Basic => basic()?,
            Scenario::Update => update()?,
            Scenario::CapacityOne => capacity_one()?,
            Scenario::MissingKey => missing_key()?,
            Scenario::Metrics => metrics()?,
            Scenario::Persistence => persistence()?,
            Scenario::Concurrency => concurrency()?,
            Scenario::SizePolicy => size_policy()?,
            Scenario::Tiered => tiered()?,
        }
        println!();
    }

    Ok(())
}

fn basic() -> Result<()> {
    let cache = BoundedCache::new(2)?;

    cache.put(1, 1);
    cache.put(2, 2);
    println!("  get(1) = {:?}", cache.get(&1));

    cache.put(3, 3);
    println!("  get(2) = {:?}", cache.get(&2));
    println!("  get(3) = {:?}", cache.get(&3));

    cache.put(4, 4);
    println!("  get(1) = {:?}", cache.get(&1));
    println!("  get(3) = {:?}", cache.get(&3));
    println!("  get(4) = {:?}", cache.get(&4));

    println!("  stats: {}", serde_json::to_string(&cache.stats())?);
    Ok(())
}

fn update() -> Result<()> {
    let cache = BoundedCache::new(2)?;

    cache.put(1, 1);
    cache.put(2, 2);
    println!("  put(1, 10) -> {:?}", cache.put(1, 10));
    println!("  get(1) = {:?}", cache.get(&1));
    println!("  get(2) = {:?}", cache.get(&2));
    Ok(())
}

fn capacity_one() -> Result<()> {
    let cache = BoundedCache::new(1)?;

    cache.put(1, 1);
    println!("  get(1) = {:?}", cache.get(&1));

    cache.put(2, 2);
    println!("  get(1) = {:?}", cache.get(&1));
    println!("  get(2) = {:?}", cache.get(&2));
    Ok(())
}

fn missing_key() -> Result<()> {
    let cache = BoundedCache::new(2)?;

    println!("  get(99) = {:?}", cache.get(&99));
    cache.put(1, 1);
    println!("  get(99) = {:?}", cache.get(&99));
    Ok(())
}

fn metrics() -> Result<()> {
    let cache = BoundedCache::new(3)?;
    println!("  initial: {}", serde_json::to_string(&cache.stats())?);

    cache.put(1, "one");
    cache.put(2, "two");
    cache.put(3, "three");
    for key in [1, 2, 3] {
        cache.get(&key);
    }
    for key in [99, 100] {
        cache.get(&key);
    }
    cache.put(4, "four");
    cache.put(5, "five");

    let stats = cache.stats();
    println!("  hits:      {}", stats.hits);
    println!("  misses:    {}", stats.misses);
    println!("  evictions: {}", stats.evictions);
    println!("  hit ratio: {:.2}%", stats.hit_ratio * 100.0);

    ensure!(stats.evictions == 2, "expected two evictions");
    Ok(())
}

fn persistence() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("cache.json");

    let cache: BoundedCache<u32, String> = BoundedCache::new(3)?;
    cache.put(1, "one".to_string());
    cache.put(2, "two".to_string());
    cache.get(&1);
    cache.put(3, "three".to_string());
    cache.get(&2);
    cache.put(4, "four".to_string());
    println!("  before save: {:?}", cache.entries());

    cache.save(&path)?;
    let loaded: BoundedCache<u32, String> = BoundedCache::load(&path)?;
    println!("  after load:  {:?}", loaded.entries());

    let entries_match = cache.entries() == loaded.entries();
    let stats_match = cache.stats() == loaded.stats();
    println!("  entries match: {}", entries_match);
    println!("  stats match:   {}", stats_match);
    ensure!(entries_match && stats_match, "snapshot round trip diverged");

    for key in 1..=4 {
        println!("  get({}) = {:?}", key, loaded.get(&key));
    }
    Ok(())
}

fn concurrency() -> Result<()> {
    const THREADS: u64 = 6;
    const OPS: u64 = 200;

    let cache = Arc::new(BoundedCache::new(10)?);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..OPS {
                    let key = (t * 1000 + i) % 40;
                    cache.put(key, format!("value_{}_{}", t, i));
                    cache.get(&key);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            anyhow::bail!("worker thread panicked");
        }
    }

    let stats = cache.stats();
    println!("  lookups counted: {} of {}", stats.hits + stats.misses, THREADS * OPS);
    println!("  usage: {} / {}", stats.current_usage, stats.capacity);
    ensure!(stats.hits + stats.misses == THREADS * OPS, "lost lookup counts");
    ensure!(stats.current_usage <= stats.capacity, "capacity exceeded");
    info!(evictions = stats.evictions, "concurrency scenario finished");
    Ok(())
}

fn size_policy() -> Result<()> {
    let cache = BoundedCache::with_policy(1000, Policy::size_with(|v: &Vec<u8>| v.len()))?;

    println!("  put(a, 400 bytes) -> {:?}", cache.put("a", vec![0; 400]));
    println!("  put(b, 700 bytes) -> {:?}", cache.put("b", vec![0; 700]));
    println!("  contains(a) = {}", cache.contains(&"a"));
    println!("  put(c, 1500 bytes) -> {:?}", cache.put("c", vec![0; 1500]));
    println!("  usage: {} / {}", cache.current_usage(), cache.capacity());

    ensure!(cache.current_usage() == 700, "unexpected usage");
    Ok(())
}

fn tiered() -> Result<()> {
    let dir = TempDir::new()?;
    let cache = TieredCache::new(BoundedCache::new(2)?, DurableStore::open(dir.path())?);

    cache.put("x".to_string(), "v".to_string())?;
    cache.put("y".to_string(), "1".to_string())?;
    cache.put("z".to_string(), "2".to_string())?;
    println!("  fast holds x: {}", cache.fast().contains(&"x".to_string()));

    println!("  get(x) = {:?}", cache.get(&"x".to_string())?);
    println!("  fast holds x: {}", cache.fast().contains(&"x".to_string()));

    let stats = cache.stats()?;
    println!("  {}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_run() {
        run(Scenario::All).unwrap();
    }
}
