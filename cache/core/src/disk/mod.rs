//! Content-addressed disk tier.
//!
//! The disk tier receives entries demoted from the memory partitions. Each
//! entry lives in its own directory derived from the SHA-256 of its key
//! (see [`HashPath`]), four levels deep to bound the fan-out per level:
//!
//! ```text
//! {base}/{hex[0:16]}/{hex[16:32]}/{hex[32:48]}/{hex[48:64]}/value.dat
//! ```
//!
//! The base directory is created at startup under a configured parent with
//! a random 8-character alphanumeric suffix, and is never reused across
//! restarts: the key set and aggregate counters are kept in memory only,
//! so whatever a previous process left on disk is unreachable garbage.
//!
//! The key set and counters are guarded by one exclusive lock, held across
//! the file I/O. Disk traffic is the cold path, and holding the lock keeps
//! the "no two concurrent puts for the same key both succeed" guarantee
//! trivially true.

mod tier;

pub use tier::{DiskStats, DiskTier};
