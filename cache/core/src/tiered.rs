//! TieredCache - the coordinator composing partitions with the disk tier.
//!
//! Keys are routed to a fixed memory partition by `djb2(key) mod N`.
//! Writes that do not fit run the demotion loop: the partition's LRU tail
//! is written to disk, then evicted from memory, and the write retries.
//! The write-to-disk-before-evict ordering is mandatory so a demoted
//! entry is never lost in between.
//!
//! # Read path
//!
//! The memory partition is authoritative: a hit returns immediately and
//! promotes the entry. On a miss the disk tier is consulted; a disk hit
//! does not re-promote the entry to memory.
//!
//! # Key lifecycle
//!
//! ```text
//!             put                          demote
//!  Absent ----------> InMemory(P) ----------------> OnDisk
//!    ^                    |                           |
//!    |  evict             | evict                     | evict
//!    +--------------------+---------------------------+
//! ```

use crate::disk::{DiskStats, DiskTier};
use crate::error::{CacheError, CacheResult};
use crate::hash::partition_index;
use crate::partition::{Entry, Partition};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Default partition count.
const DEFAULT_PARTITIONS: u8 = 3;

/// Default total memory budget (100 MB).
const DEFAULT_CAPACITY: u64 = 100 * 1024 * 1024;

/// Point-in-time usage snapshot for one partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionSnapshot {
    /// Live entries in the partition.
    pub entries: u64,
    /// The partition's byte budget.
    pub capacity: u64,
    /// Bytes currently charged.
    pub used: u64,
    /// Remaining budget.
    pub free: u64,
    /// Lookup hits since startup.
    pub hits: u64,
    /// Lookup misses since startup.
    pub misses: u64,
    /// `hits / (hits + misses)`, or zero before the first lookup.
    pub hit_ratio: f64,
}

/// Point-in-time snapshot of the whole cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Total memory budget across all partitions.
    pub capacity: u64,
    /// Bytes used across all partitions.
    pub used: u64,
    /// Remaining memory budget.
    pub free: u64,
    /// Per-partition snapshots, in partition order.
    pub partitions: Vec<PartitionSnapshot>,
    /// Disk tier usage.
    pub disk: DiskStats,
}

/// The two-tier cache: N memory partitions over one disk tier.
pub struct TieredCache {
    partitions: Vec<Partition>,
    disk: DiskTier,
    total_capacity: u64,
}

/// Builder for [`TieredCache`].
pub struct TieredCacheBuilder {
    partitions: u8,
    capacity: u64,
    disk_root: Option<PathBuf>,
}

impl TieredCacheBuilder {
    fn new() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            capacity: DEFAULT_CAPACITY,
            disk_root: None,
        }
    }

    /// Number of memory partitions (1-255).
    pub fn partitions(mut self, partitions: u8) -> Self {
        self.partitions = partitions;
        self
    }

    /// Total memory budget in bytes, divided evenly across partitions
    /// (integer division; the remainder is not recovered).
    pub fn capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    /// Parent directory under which the disk tier creates its
    /// random-suffixed base directory. Required.
    pub fn disk_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_root = Some(path.into());
        self
    }

    /// Build the cache, creating the partitions and opening the disk
    /// tier.
    pub fn build(self) -> CacheResult<TieredCache> {
        if self.partitions == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "partition count must be between 1 and 255",
            )
            .into());
        }
        let Some(disk_root) = self.disk_root else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "disk root is required",
            )
            .into());
        };

        let partition_capacity = self.capacity / u64::from(self.partitions);
        let partitions = (0..self.partitions)
            .map(|_| Partition::new(partition_capacity))
            .collect();
        let disk = DiskTier::open(&disk_root)?;

        tracing::info!(
            partitions = self.partitions,
            partition_capacity,
            total_capacity = self.capacity,
            "creating tiered cache"
        );

        Ok(TieredCache {
            partitions,
            disk,
            total_capacity: self.capacity,
        })
    }
}

impl TieredCache {
    /// Start building a cache.
    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::new()
    }

    /// Number of memory partitions.
    #[inline]
    pub fn partition_count(&self) -> u8 {
        self.partitions.len() as u8
    }

    /// Total memory budget in bytes.
    #[inline]
    pub fn total_capacity(&self) -> u64 {
        self.total_capacity
    }

    /// A partition by index.
    pub fn partition(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    /// The disk tier.
    pub fn disk(&self) -> &DiskTier {
        &self.disk
    }

    #[inline]
    fn partition_for(&self, key: &[u8]) -> &Partition {
        &self.partitions[partition_index(key, self.partition_count())]
    }

    /// Store an entry, demoting the partition's LRU tail to disk as many
    /// times as needed to make room.
    ///
    /// Fails with [`CacheError::ValueTooLarge`] when the value alone
    /// exceeds the partition budget, and with [`CacheError::Io`] when a
    /// demotion's disk write fails.
    pub fn put(&self, key: &[u8], value: Bytes) -> CacheResult<()> {
        let value_size = value.len() as u64;
        let partition = self.partition_for(key);

        loop {
            match partition.put(key, value.clone(), value_size) {
                Ok(()) => return Ok(()),
                Err(CacheError::MemoryFull) => {
                    let Some(tail) = partition.peek_tail() else {
                        return Err(CacheError::ValueTooLarge {
                            size: value_size,
                            capacity: partition.max_capacity(),
                        });
                    };
                    self.demote(partition, tail)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Move one entry from a partition's LRU end to disk. The disk write
    /// completes before the memory copy is removed.
    fn demote(&self, partition: &Partition, tail: Entry) -> CacheResult<()> {
        tracing::debug!(
            key = %String::from_utf8_lossy(&tail.key),
            value_size = tail.value_size,
            "demoting LRU tail to disk"
        );
        match self.disk.put(&tail.key, &tail.value) {
            Ok(()) => {}
            Err(CacheError::AlreadyOnDisk) => {
                // A stale copy from an earlier demotion; overwrite it.
                self.disk.evict(&tail.key)?;
                self.disk.put(&tail.key, &tail.value)?;
            }
            Err(e) => return Err(e),
        }
        partition.evict(&tail.key);
        Ok(())
    }

    /// Look up a key: the memory partition first, then the disk tier.
    pub fn get(&self, key: &[u8]) -> CacheResult<Option<Bytes>> {
        if let Some(value) = self.partition_for(key).get(key) {
            return Ok(Some(value));
        }
        self.disk.get(key)
    }

    /// Remove a key from whichever tier holds it. Returns whether it was
    /// present.
    pub fn evict(&self, key: &[u8]) -> CacheResult<bool> {
        if self.partition_for(key).evict(key) {
            return Ok(true);
        }
        self.disk.evict(key)
    }

    /// Snapshot per-partition and disk usage.
    pub fn stats(&self) -> CacheStats {
        let mut partitions = Vec::with_capacity(self.partitions.len());
        let mut used = 0;
        for partition in &self.partitions {
            let stats = partition.stats();
            let lookups = stats.hits + stats.misses;
            let hit_ratio = if lookups == 0 {
                0.0
            } else {
                stats.hits as f64 / lookups as f64
            };
            used += stats.current_capacity;
            partitions.push(PartitionSnapshot {
                entries: partition.item_count() as u64,
                capacity: stats.max_capacity,
                used: stats.current_capacity,
                free: stats.max_capacity - stats.current_capacity,
                hits: stats.hits,
                misses: stats.misses,
                hit_ratio,
            });
        }
        CacheStats {
            capacity: self.total_capacity,
            used,
            free: self.total_capacity - used,
            partitions,
            disk: self.disk.stats(),
        }
    }

    /// Compact every partition's index backing storage.
    pub fn shrink(&self) {
        for partition in &self.partitions {
            partition.shrink();
        }
    }

    /// The disk tier's base directory.
    pub fn disk_base_path(&self) -> &Path {
        self.disk.base_path()
    }
}
