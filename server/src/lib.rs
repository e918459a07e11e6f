//! PodCache server.
//!
//! A single-node, RESP-compatible cache server over the two-tier storage
//! engine in `cache-core`: environment-driven configuration, a tokio
//! accept loop with one task per connection, command execution against
//! the tiered coordinator, and a periodic statistics ticker.

pub mod config;
pub mod connection;
pub mod execute;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod signal;
pub mod stats;

pub use config::Config;
pub use signal::ShutdownSignal;
