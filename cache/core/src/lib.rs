//! cache-core: the two-tier storage engine behind PodCache.
//!
//! This crate provides the building blocks for a sharded, byte-budgeted
//! cache with disk spill:
//!
//! - **Hashing**: DJB2 partition selection, SHA-256 content-addressed paths
//! - **Partition**: an LRU memory shard bounded by a byte budget
//! - **Disk tier**: a content-addressed blob store for demoted entries
//! - **Tiered cache**: the coordinator routing keys across partitions and
//!   demoting LRU tails to disk under memory pressure
//!
//! # Architecture
//!
//! ```text
//!                 +---------------------------+
//!                 |        TieredCache        |
//!                 |  (djb2(key) mod N route)  |
//!                 +-------------+-------------+
//!                               |
//!          +----------+--------+--+----------+
//!          v          v           v          v
//!     +--------+ +--------+  +--------+ +--------+
//!     | Part 0 | | Part 1 |  |  ...   | | Part N |   memory tier (LRU)
//!     +---+----+ +---+----+  +---+----+ +---+----+
//!         |          |           |          |  demote LRU tail
//!         +----------+-----+-----+----------+
//!                          v
//!                    +-----------+
//!                    | DiskTier  |   {base}/{sha256 4x16 hex}/value.dat
//!                    +-----------+
//! ```
//!
//! The memory tier is authoritative on read. Entries evicted from a
//! partition under write pressure are demoted to the disk tier rather than
//! discarded; a disk hit does not re-promote the entry to memory.
//!
//! # Example
//!
//! ```ignore
//! use cache_core::TieredCache;
//!
//! let cache = TieredCache::builder()
//!     .partitions(4)
//!     .capacity(64 * 1024 * 1024)
//!     .disk_root("/var/cache/podcache")
//!     .build()?;
//!
//! cache.put(b"key", bytes::Bytes::from_static(b"value"))?;
//! assert!(cache.get(b"key")?.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod partition;
mod tiered;

pub mod disk;

pub use disk::{DiskStats, DiskTier};
pub use error::{CacheError, CacheResult};
pub use hash::{HashPath, djb2, partition_index};
pub use partition::{Entry, Partition, PartitionStats};
pub use tiered::{CacheStats, PartitionSnapshot, TieredCache, TieredCacheBuilder};
