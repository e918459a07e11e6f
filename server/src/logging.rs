//! Structured logging initialization.
//!
//! Configures the tracing subscriber for the process. The `RUST_LOG`
//! environment variable takes precedence over the built-in `info` level.

use tracing_subscriber::EnvFilter;

/// Initialize the logging subsystem.
///
/// # Example
///
/// ```ignore
/// podcache_server::logging::init();
/// tracing::info!("server starting");
/// ```
pub fn init() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
