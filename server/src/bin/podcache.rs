//! PodCache server binary.

use cache_core::TieredCache;
use podcache_server::config::Config;
use podcache_server::{logging, runtime, signal};

fn main() {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "welcome to podcache");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to read configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        port = config.port,
        partitions = config.partitions,
        capacity_mb = config.capacity / (1024 * 1024),
        capacity_bytes = config.capacity,
        disk_root = %config.disk_root.display(),
        "cache configuration"
    );

    let cache = match TieredCache::builder()
        .partitions(config.partitions)
        .capacity(config.capacity)
        .disk_root(&config.disk_root)
        .build()
    {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize cache");
            std::process::exit(1);
        }
    };

    let shutdown = signal::install_signal_handler();

    if let Err(e) = runtime::run(&config, cache, shutdown) {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }

    tracing::info!("podcache shutdown complete");
}
