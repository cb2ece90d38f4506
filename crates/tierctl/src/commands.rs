//! One-shot commands against snapshots and data directories

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tiercache::{BoundedCache, DurableStore, PutOutcome, TieredCache};
use tracing::{info, warn};

use crate::TierArgs;

/// Fast tier snapshot kept next to the durable records
const FAST_SNAPSHOT: &str = "fast-tier.json";

/// Scalar JSON key, enough to inspect snapshots written by any caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarKey {
    /// Integer key
    Int(i64),
    /// String key
    Text(String),
    /// Boolean key
    Flag(bool),
}

/// Load and validate a snapshot, then print it
pub fn inspect(path: &Path) -> Result<()> {
    let cache: BoundedCache<ScalarKey, Value> = BoundedCache::load(path)
        .with_context(|| format!("Failed to load snapshot {:?}", path))?;

    let entries: Vec<_> = cache
        .entries()
        .into_iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();

    let report = json!({ "stats": cache.stats(), "entries": entries });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn put(args: &TierArgs, key: String, value: String) -> Result<()> {
    let cache = open_tiers(args)?;

    let outcome = cache.put(key.clone(), value)?;
    if outcome == PutOutcome::Rejected {
        warn!("{} stored on disk only: too large for the fast tier", key);
    }
    println!("{:?}", outcome);

    save_fast(&cache, &args.data)
}

pub fn get(args: &TierArgs, key: String) -> Result<()> {
    let cache = open_tiers(args)?;

    match cache.get(&key)? {
        Some(value) => println!("{}", value),
        None => println!("(nil)"),
    }

    let stats = cache.stats()?;
    info!(
        fast_hits = stats.fast.hits,
        durable_hits = stats.durable.hits,
        combined_hit_ratio = stats.combined_hit_ratio,
        "lookup finished"
    );

    save_fast(&cache, &args.data)
}

pub fn remove(args: &TierArgs, key: String) -> Result<()> {
    let cache = open_tiers(args)?;

    let removed = cache.remove(&key)?;
    println!("{}", if removed { 1 } else { 0 });

    save_fast(&cache, &args.data)
}

pub fn disk_usage(data: &Path) -> Result<()> {
    let store = DurableStore::open(data)
        .with_context(|| format!("Failed to open data directory {:?}", data))?;

    let report = json!({
        "root": store.root(),
        "records": store.len()?,
        "total_size_bytes": store.total_size_bytes()?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn open_tiers(args: &TierArgs) -> Result<TieredCache<String, String>> {
    let durable = DurableStore::open(&args.data)
        .with_context(|| format!("Failed to open data directory {:?}", args.data))?;

    let snapshot = snapshot_path(&args.data);
    let fast = if snapshot.exists() {
        let fast: BoundedCache<String, String> = BoundedCache::load(&snapshot)
            .with_context(|| format!("Failed to load fast tier from {:?}", snapshot))?;
        if fast.capacity() != args.capacity {
            info!(
                "Using saved fast tier capacity {} (ignoring --capacity {})",
                fast.capacity(),
                args.capacity
            );
        }
        fast
    } else {
        BoundedCache::new(args.capacity).context("Invalid fast tier capacity")?
    };

    Ok(TieredCache::new(fast, durable))
}

fn save_fast(cache: &TieredCache<String, String>, data: &Path) -> Result<()> {
    let snapshot = snapshot_path(data);
    cache
        .fast()
        .save(&snapshot)
        .with_context(|| format!("Failed to save fast tier to {:?}", snapshot))
}

fn snapshot_path(data: &Path) -> PathBuf {
    data.join(FAST_SNAPSHOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(dir: &TempDir) -> TierArgs {
        TierArgs {
            data: dir.path().to_path_buf(),
            capacity: 2,
        }
    }

    #[test]
    fn test_fast_tier_survives_between_commands() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir);

        put(&args, "a".into(), "1".into()).unwrap();
        put(&args, "b".into(), "2".into()).unwrap();

        let cache = open_tiers(&args).unwrap();
        assert!(cache.fast().contains(&"a".to_string()));
        assert!(cache.fast().contains(&"b".to_string()));
        assert_eq!(cache.durable().len().unwrap(), 2);
    }

    #[test]
    fn test_remove_clears_both_tiers() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir);

        put(&args, "a".into(), "1".into()).unwrap();
        remove(&args, "a".into()).unwrap();

        let cache = open_tiers(&args).unwrap();
        assert!(cache.fast().is_empty());
        assert!(cache.durable().is_empty().unwrap());
    }

    #[test]
    fn test_scalar_keys() {
        let keys: Vec<ScalarKey> = serde_json::from_str(r#"[1, "x", true]"#).unwrap();
        assert_eq!(
            keys,
            vec![
                ScalarKey::Int(1),
                ScalarKey::Text("x".into()),
                ScalarKey::Flag(true)
            ]
        );
    }

    #[test]
    fn test_inspect_rejects_invalid_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"capacity": 1, "entries": [{"key": 1, "value": 1}, {"key": 2, "value": 2}],
                "metrics": {"hits": 0, "misses": 0, "evictions": 0}}"#,
        )
        .unwrap();

        assert!(inspect(&path).is_err());
    }
}
