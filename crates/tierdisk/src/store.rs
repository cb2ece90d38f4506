//! Durable store implementation
//!
//! Directory layout:
//! - `<sha256(key)>.rec`: one record per key (see [`crate::record`])
//! - `.tmp*`: in-flight writes, renamed over the record on completion

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::record::{self, HEADER_LEN};
use crate::stats::{AccessSnapshot, AccessStats};

/// File extension for record files
const RECORD_EXT: &str = "rec";

/// Filesystem-backed key-value store with no eviction policy
///
/// Every `put` is synchronous: the record is written to a temp file,
/// synced, and renamed into place before the call returns, so a reader
/// sees either the old record or the new one, never a partial write.
pub struct DurableStore {
    /// Directory holding the record files
    root: PathBuf,

    /// Read/write counters
    stats: AccessStats,
}

impl DurableStore {
    /// Open or create a store rooted at the given directory
    ///
    /// # Arguments
    /// * `root` - Directory for record files, created if missing
    ///
    /// # Returns
    /// * `Result<DurableStore>` - Store handle, or an error if the
    ///   directory cannot be created or written to
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if root.exists() && !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }
        fs::create_dir_all(root)?;

        // Probe with an anonymous file; it disappears when dropped.
        tempfile::tempfile_in(root).map_err(|source| Error::Unwritable {
            path: root.to_path_buf(),
            source,
        })?;

        debug!(root = ?root, "durable store opened");

        Ok(Self {
            root: root.to_path_buf(),
            stats: AccessStats::new(),
        })
    }

    /// Store a value under a key, replacing any previous record
    pub fn put<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key_bytes = serde_json::to_vec(key)?;
        let value_bytes = serde_json::to_vec(value)?;
        let path = self.record_path(&key_bytes);
        let record = record::encode(&key_bytes, &value_bytes)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&record)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        self.stats.record_write();
        debug!(path = ?path, bytes = record.len(), "record written");

        Ok(())
    }

    /// Read the value stored under a key
    ///
    /// # Returns
    /// * `Ok(None)` - No record for this key
    /// * `Ok(Some(value))` - Decoded value
    /// * `Err(_)` - The record exists but could not be read or decoded
    pub fn get<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let key_bytes = serde_json::to_vec(key)?;
        let path = self.record_path(&key_bytes);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.stats.record_miss();
                trace!(path = ?path, "record miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record = record::decode(&bytes).map_err(|reason| Error::Corrupt {
            path: path.clone(),
            reason,
        })?;

        if record.key != key_bytes.as_slice() {
            warn!(path = ?path, "record belongs to a different key");
            self.stats.record_miss();
            return Ok(None);
        }

        let value = serde_json::from_slice(record.value)?;
        self.stats.record_hit();
        trace!(path = ?path, "record hit");

        Ok(Some(value))
    }

    /// Check whether a record exists for a key
    ///
    /// Reads only the header and key; does not count as a hit or miss.
    pub fn exists<K>(&self, key: &K) -> Result<bool>
    where
        K: Serialize + ?Sized,
    {
        let key_bytes = serde_json::to_vec(key)?;
        let path = self.record_path(&key_bytes);
        self.holds_key(&path, &key_bytes)
    }

    /// Remove the record for a key
    ///
    /// # Returns
    /// * `Result<bool>` - `true` if a record was removed, `false` if there
    ///   was none
    pub fn remove<K>(&self, key: &K) -> Result<bool>
    where
        K: Serialize + ?Sized,
    {
        let key_bytes = serde_json::to_vec(key)?;
        let path = self.record_path(&key_bytes);

        if !self.holds_key(&path, &key_bytes)? {
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                self.stats.record_removal();
                debug!(path = ?path, "record removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every record in the store
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records removed
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;

        for path in self.record_paths()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(root = ?self.root, removed, "store cleared");
        Ok(removed)
    }

    /// Total size of all record files in bytes
    pub fn total_size_bytes(&self) -> Result<u64> {
        let mut total = 0;

        for path in self.record_paths()? {
            match fs::metadata(&path) {
                Ok(meta) => total += meta.len(),
                // Removed between listing and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(total)
    }

    /// Number of records in the store
    pub fn len(&self) -> Result<usize> {
        Ok(self.record_paths()?.len())
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Directory holding the records
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get access statistics
    pub fn stats(&self) -> AccessSnapshot {
        self.stats.snapshot()
    }

    /// Reset access statistics (records are untouched)
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn record_path(&self, key_bytes: &[u8]) -> PathBuf {
        let digest = Sha256::digest(key_bytes);
        self.root
            .join(format!("{:x}", digest))
            .with_extension(RECORD_EXT)
    }

    fn holds_key(&self, path: &Path, key_bytes: &[u8]) -> Result<bool> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut header_buf = [0u8; HEADER_LEN];
        file.read_exact(&mut header_buf)
            .map_err(|e| corrupt_or_io(path, e))?;
        let header = record::parse_header(&header_buf).map_err(|reason| Error::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;

        if header.key_len as usize != key_bytes.len() {
            return Ok(false);
        }

        let mut stored_key = vec![0u8; key_bytes.len()];
        file.read_exact(&mut stored_key)
            .map_err(|e| corrupt_or_io(path, e))?;

        Ok(stored_key == key_bytes)
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXT) {
                trace!(path = ?path, "skipping non-record file");
                continue;
            }
            if entry.file_type()?.is_file() {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

fn corrupt_or_io(path: &Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Corrupt {
            path: path.to_path_buf(),
            reason: "truncated record".to_string(),
        }
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("store");

        let store = DurableStore::open(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_open_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let result = DurableStore::open(&file);
        assert!(matches!(result, Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("user:1", "Alice").unwrap();
        let value: Option<String> = store.get("user:1").unwrap();

        assert_eq!(value.as_deref(), Some("Alice"));
        assert_eq!(store.stats().hits, 1);
        assert_eq!(store.stats().writes, 1);
    }

    #[test]
    fn test_get_not_found() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        let value: Option<String> = store.get("missing").unwrap();
        assert!(value.is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put(&7u32, &vec![1, 2]).unwrap();
        store.put(&7u32, &vec![3]).unwrap();

        let value: Option<Vec<i32>> = store.get(&7u32).unwrap();
        assert_eq!(value, Some(vec![3]));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_exists_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("a", &1).unwrap();
        assert!(store.exists("a").unwrap());
        assert!(!store.exists("b").unwrap());

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(!store.exists("a").unwrap());
        assert_eq!(store.stats().removals, 1);
    }

    #[test]
    fn test_clear_and_size() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("a", "one").unwrap();
        store.put("b", "two").unwrap();
        // Non-record files are left alone
        fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        let size = store.total_size_bytes().unwrap();
        let expected = 2 * (HEADER_LEN as u64 + 3 + 5);
        assert_eq!(size, expected);

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.total_size_bytes().unwrap(), 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();

        {
            let store = DurableStore::open(dir.path()).unwrap();
            store.put("k", "survives").unwrap();
        }

        {
            let store = DurableStore::open(dir.path()).unwrap();
            let value: Option<String> = store.get("k").unwrap();
            assert_eq!(value.as_deref(), Some("survives"));
        }
    }

    #[test]
    fn test_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store.put("k", "v").unwrap();

        let path = store.record_path(&serde_json::to_vec("k").unwrap());
        fs::write(&path, b"garbage").unwrap();

        let result: Result<Option<String>> = store.get("k");
        assert!(matches!(result, Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_overflowing_length_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        let path = store.record_path(&serde_json::to_vec("k").unwrap());
        let mut buf = record::encode(b"\"k\"", b"").unwrap();
        buf[HEADER_LEN - 8..HEADER_LEN].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&path, buf).unwrap();

        let result: Result<Option<String>> = store.get("k");
        assert!(matches!(result, Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_non_record_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store.put("k", "v").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a record").unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.total_size_bytes().unwrap(), (HEADER_LEN + 3 + 3) as u64);
        assert_eq!(store.clear().unwrap(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_colliding_name_reads_as_miss() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        // Plant another key's record under "k"'s file name
        let path = store.record_path(&serde_json::to_vec("k").unwrap());
        fs::write(&path, record::encode(b"\"other\"", b"1").unwrap()).unwrap();

        let value: Option<i32> = store.get("k").unwrap();
        assert!(value.is_none());
        assert!(!store.exists("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(path.exists());
    }
}
