//! The disk tier blob store.

use crate::error::{CacheError, CacheResult};
use crate::hash::HashPath;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::distr::{Alphanumeric, SampleString};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name holding an entry's value inside its content-addressed
/// directory.
const VALUE_FILE: &str = "value.dat";

/// Length of the random suffix appended to the configured parent
/// directory.
const BASE_SUFFIX_LEN: usize = 8;

/// Aggregate disk tier usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    /// Number of entries resident on disk.
    pub entries: u64,
    /// Total value bytes resident on disk.
    pub used_bytes: u64,
}

struct DiskIndex {
    /// Key to value size, for resident entries only.
    entries: HashMap<Box<[u8]>, u64, ahash::RandomState>,
    used_bytes: u64,
}

/// Content-addressed blob store for demoted entries.
pub struct DiskTier {
    base_path: PathBuf,
    inner: Mutex<DiskIndex>,
}

impl DiskTier {
    /// Open a fresh tier under `parent`, creating a base directory with a
    /// random 8-character alphanumeric suffix. A suffix collision is
    /// retried with a new suffix; the chosen base path is fixed for the
    /// process lifetime.
    pub fn open(parent: &Path) -> CacheResult<Self> {
        create_dir_0755(parent)?;
        let base_path = loop {
            let suffix = Alphanumeric.sample_string(&mut rand::rng(), BASE_SUFFIX_LEN);
            let candidate = parent.join(suffix);
            match make_base_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        };
        tracing::info!(base_path = %base_path.display(), "disk tier ready");
        Ok(Self {
            base_path,
            inner: Mutex::new(DiskIndex {
                entries: HashMap::default(),
                used_bytes: 0,
            }),
        })
    }

    /// The tier's base directory.
    #[inline]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write an entry's value file, creating its directory chain.
    ///
    /// Returns [`CacheError::AlreadyOnDisk`] if the key is already
    /// resident; the caller decides whether to overwrite (evict, then put
    /// again).
    pub fn put(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        let mut index = self.inner.lock();
        if index.entries.contains_key(key) {
            return Err(CacheError::AlreadyOnDisk);
        }

        let entry_dir = HashPath::from_key(key).join(&self.base_path);
        create_dir_0755(&entry_dir)?;
        write_file_0644(&entry_dir.join(VALUE_FILE), value)?;

        index.entries.insert(key.into(), value.len() as u64);
        index.used_bytes += value.len() as u64;
        Ok(())
    }

    /// Read an entry's value, or `None` if the key is not resident.
    pub fn get(&self, key: &[u8]) -> CacheResult<Option<Bytes>> {
        let index = self.inner.lock();
        if !index.entries.contains_key(key) {
            return Ok(None);
        }
        let value_path = HashPath::from_key(key)
            .join(&self.base_path)
            .join(VALUE_FILE);
        let value = fs::read(&value_path)?;
        Ok(Some(Bytes::from(value)))
    }

    /// Remove an entry's value file and prune directories it leaves
    /// empty, up to (not including) the base path. Returns whether the
    /// key was resident.
    pub fn evict(&self, key: &[u8]) -> CacheResult<bool> {
        let mut index = self.inner.lock();
        if !index.entries.contains_key(key) {
            return Ok(false);
        }

        let entry_dir = HashPath::from_key(key).join(&self.base_path);
        fs::remove_file(entry_dir.join(VALUE_FILE))?;

        let mut dir = entry_dir.as_path();
        while dir != self.base_path && fs::remove_dir(dir).is_ok() {
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }

        if let Some(size) = index.entries.remove(key) {
            index.used_bytes -= size;
        }
        Ok(true)
    }

    /// Aggregate entry count and byte usage.
    pub fn stats(&self) -> DiskStats {
        let index = self.inner.lock();
        DiskStats {
            entries: index.entries.len() as u64,
            used_bytes: index.used_bytes,
        }
    }
}

/// Create the base directory, failing with `AlreadyExists` on suffix
/// collision so the caller can retry.
fn make_base_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(0o755).create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir(path)
    }
}

/// Recursively create a directory chain with 0755 permissions.
fn create_dir_0755(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

/// Write a value file with 0644 permissions.
fn write_file_0644(path: &Path, value: &[u8]) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(path)?;
        file.write_all(value)
    }
    #[cfg(not(unix))]
    {
        fs::write(path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tier(dir: &TempDir) -> DiskTier {
        DiskTier::open(dir.path()).unwrap()
    }

    #[test]
    fn test_base_path_has_random_suffix() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        let name = tier.base_path().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), BASE_SUFFIX_LEN);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(tier.base_path().is_dir());

        // A second tier under the same parent gets its own base.
        let other = open_tier(&dir);
        assert_ne!(tier.base_path(), other.base_path());
    }

    #[test]
    fn test_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);

        tier.put(b"alpha", b"payload").unwrap();
        assert_eq!(
            tier.get(b"alpha").unwrap(),
            Some(Bytes::from_static(b"payload"))
        );
        assert_eq!(tier.get(b"beta").unwrap(), None);

        let stats = tier.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.used_bytes, 7);
    }

    #[test]
    fn test_value_lands_in_four_level_tree() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"alpha", b"v").unwrap();

        let expected = HashPath::from_key(b"alpha")
            .join(tier.base_path())
            .join(VALUE_FILE);
        assert!(expected.is_file());
        assert_eq!(fs::read(&expected).unwrap(), b"v");
    }

    #[test]
    fn test_duplicate_put_refused() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"k", b"v1").unwrap();
        assert!(matches!(
            tier.put(b"k", b"v2"),
            Err(CacheError::AlreadyOnDisk)
        ));
        // The original value is untouched.
        assert_eq!(tier.get(b"k").unwrap(), Some(Bytes::from_static(b"v1")));
        assert_eq!(tier.stats().used_bytes, 2);
    }

    #[test]
    fn test_evict_removes_entry_and_counters() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"k", b"value").unwrap();

        assert!(tier.evict(b"k").unwrap());
        assert_eq!(tier.get(b"k").unwrap(), None);
        let stats = tier.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.used_bytes, 0);

        // Second evict reports absence.
        assert!(!tier.evict(b"k").unwrap());
    }

    #[test]
    fn test_evict_prunes_empty_directories() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"k", b"v").unwrap();

        let top_segment = tier
            .base_path()
            .join(HashPath::from_key(b"k").segments()[0]);
        assert!(top_segment.is_dir());

        tier.evict(b"k").unwrap();
        assert!(!top_segment.exists());
        assert!(tier.base_path().is_dir());
    }

    #[test]
    fn test_evict_keeps_shared_prefix_of_other_entries() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"one", b"1").unwrap();
        tier.put(b"two", b"2").unwrap();

        tier.evict(b"one").unwrap();
        assert_eq!(tier.get(b"two").unwrap(), Some(Bytes::from_static(b"2")));
        let other = HashPath::from_key(b"two")
            .join(tier.base_path())
            .join(VALUE_FILE);
        assert!(other.is_file());
    }

    #[test]
    fn test_put_after_evict_succeeds() {
        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"k", b"old").unwrap();
        tier.evict(b"k").unwrap();
        tier.put(b"k", b"new").unwrap();
        assert_eq!(tier.get(b"k").unwrap(), Some(Bytes::from_static(b"new")));
        assert_eq!(tier.stats().used_bytes, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let tier = open_tier(&dir);
        tier.put(b"k", b"v").unwrap();

        let entry_dir = HashPath::from_key(b"k").join(tier.base_path());
        let dir_mode = fs::metadata(&entry_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        let file_mode = fs::metadata(entry_dir.join(VALUE_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o644);
    }
}
