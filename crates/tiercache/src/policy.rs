//! Admission policies
//!
//! A cache charges every entry some number of units against its capacity.
//! Under [`Policy::Count`] each entry costs one unit; under
//! [`Policy::Size`] it costs whatever the sizer reports, in bytes.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Function measuring a value in bytes
pub type Sizer<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Basis for the capacity constraint, chosen at construction
pub enum Policy<V> {
    /// One unit per entry
    Count,
    /// Measured bytes per entry
    Size(Sizer<V>),
}

/// Data-only tag for [`Policy`], as written in snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// One unit per entry
    #[default]
    Count,
    /// Measured bytes per entry
    Size,
}

impl<V> Policy<V> {
    /// Count-based policy
    pub fn count() -> Self {
        Policy::Count
    }

    /// Size-based policy using [`json_size`]
    pub fn size() -> Self
    where
        V: Serialize + 'static,
    {
        Policy::Size(Arc::new(json_size::<V>))
    }

    /// Size-based policy with a custom sizer
    pub fn size_with<F>(sizer: F) -> Self
    where
        F: Fn(&V) -> usize + Send + Sync + 'static,
    {
        Policy::Size(Arc::new(sizer))
    }

    /// Tag for this policy
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Count => PolicyKind::Count,
            Policy::Size(_) => PolicyKind::Size,
        }
    }

    /// Units charged for a value
    pub fn measure(&self, value: &V) -> usize {
        match self {
            Policy::Count => 1,
            Policy::Size(sizer) => sizer(value),
        }
    }
}

impl<V> Clone for Policy<V> {
    fn clone(&self) -> Self {
        match self {
            Policy::Count => Policy::Count,
            Policy::Size(sizer) => Policy::Size(Arc::clone(sizer)),
        }
    }
}

impl<V> fmt::Debug for Policy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Count => f.write_str("Count"),
            Policy::Size(_) => f.write_str("Size(..)"),
        }
    }
}

/// Default size estimator: length of the value's compact JSON encoding
///
/// Counts bytes as they are produced rather than building the string.
/// A value that fails to encode measures `usize::MAX`, so only a cache
/// whose capacity is `usize::MAX` would admit it.
pub fn json_size<V: Serialize + ?Sized>(value: &V) -> usize {
    let mut counter = ByteCounter(0);
    match serde_json::to_writer(&mut counter, value) {
        Ok(()) => counter.0,
        Err(e) => {
            warn!(error = %e, "value cannot be measured");
            usize::MAX
        }
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 = self.0.saturating_add(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_size() {
        assert_eq!(json_size("abc"), 5);
        assert_eq!(json_size(&12345u32), 5);
        assert_eq!(json_size(&vec![1u8, 2, 3]), 7);
        assert_eq!(json_size(&()), 4); // null
    }

    #[test]
    fn test_unencodable_value() {
        // JSON object keys must be strings
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1u8);
        assert_eq!(json_size(&map), usize::MAX);
    }

    #[test]
    fn test_measure() {
        let count: Policy<String> = Policy::count();
        let size: Policy<String> = Policy::size();
        let custom: Policy<String> = Policy::size_with(|s: &String| s.len() * 10);

        let value = "hello".to_string();
        assert_eq!(count.measure(&value), 1);
        assert_eq!(size.measure(&value), 7);
        assert_eq!(custom.measure(&value), 50);

        assert_eq!(count.kind(), PolicyKind::Count);
        assert_eq!(custom.clone().kind(), PolicyKind::Size);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&PolicyKind::Size).unwrap(), "\"size\"");
        let kind: PolicyKind = serde_json::from_str("\"count\"").unwrap();
        assert_eq!(kind, PolicyKind::Count);
    }
}
