//! Signal handling for graceful shutdown.
//!
//! A [`ShutdownSignal`] pairs an atomic flag with a notifier so the
//! accept loop can both poll and await shutdown. `install_signal_handler`
//! wires it to SIGINT/SIGTERM; a second signal forces immediate exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Shared shutdown state.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown: set the flag and wake every waiter.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait until [`trigger`](Self::trigger) is called.
    pub async fn triggered(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before the final flag check so a trigger landing in
        // between still wakes us.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

/// Install SIGINT/SIGTERM handlers that trigger the returned signal.
///
/// The first signal requests a graceful shutdown; a second one forces the
/// process to exit immediately.
pub fn install_signal_handler() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    let handle = shutdown.clone();

    ctrlc::set_handler(move || {
        if handle.is_triggered() {
            tracing::warn!("received second signal, forcing immediate exit");
            std::process::exit(1);
        }
        tracing::info!("received shutdown signal, initiating graceful shutdown");
        handle.trigger();
    })
    .expect("failed to set signal handler");

    shutdown
}
