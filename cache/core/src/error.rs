//! Error types for cache operations.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The entry does not fit in the partition's remaining byte budget.
    ///
    /// This is a recoverable signal, not a failure: the tiered coordinator
    /// consumes it to drive the demotion loop and it never reaches clients.
    #[error("memory full")]
    MemoryFull,

    /// The key already has a value file in the disk tier.
    ///
    /// Raised by [`DiskTier::put`](crate::DiskTier::put) for a known key.
    /// The coordinator resolves it by overwriting the stale copy.
    #[error("key already present in disk tier")]
    AlreadyOnDisk,

    /// The value is larger than an entire partition's byte budget.
    ///
    /// The demotion loop drained the partition and the value still did not
    /// fit; it can never be admitted to the memory tier.
    #[error("value of {size} bytes exceeds partition capacity of {capacity} bytes")]
    ValueTooLarge {
        /// Size of the rejected value in bytes.
        size: u64,
        /// The partition's byte budget.
        capacity: u64,
    },

    /// A filesystem operation in the disk tier failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
