//! Periodic cache statistics logging.
//!
//! A background task snapshots the coordinator on a fixed cadence and
//! logs the totals, the disk tier, and each partition.

use cache_core::TieredCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cadence of the statistics snapshot.
pub const STATS_INTERVAL: Duration = Duration::from_secs(6);

/// Spawn the statistics ticker on the current runtime.
pub fn spawn_stats_ticker(cache: Arc<TieredCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + STATS_INTERVAL;
        let mut interval = tokio::time::interval_at(start, STATS_INTERVAL);
        loop {
            interval.tick().await;
            log_stats(&cache);
        }
    })
}

fn log_stats(cache: &TieredCache) {
    let stats = cache.stats();
    tracing::info!(
        capacity = stats.capacity,
        used = stats.used,
        free = stats.free,
        "cache statistics"
    );
    tracing::info!(
        entries = stats.disk.entries,
        used = stats.disk.used_bytes,
        "disk statistics"
    );
    for (i, p) in stats.partitions.iter().enumerate() {
        tracing::info!(
            partition = i,
            entries = p.entries,
            capacity = p.capacity,
            used = p.used,
            free = p.free,
            hits = p.hits,
            misses = p.misses,
            hit_ratio = p.hit_ratio,
            "partition statistics"
        );
    }
}
