//! Tokio runtime server loop.
//!
//! One accept loop, one spawned task per connection. The engine blocks on
//! file I/O during demotions; that happens on the calling task, which is
//! acceptable because demotion is the cold path.

use crate::config::Config;
use crate::connection::Connection;
use crate::metrics::{CONNECTIONS_ACCEPTED, CONNECTIONS_ACTIVE};
use crate::signal::ShutdownSignal;
use crate::stats;
use cache_core::TieredCache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Per-connection read idle deadline.
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket read chunk size.
const READ_CHUNK: usize = 16 * 1024;

/// How long shutdown waits for in-flight connections to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the server until the shutdown signal triggers.
///
/// Builds a multi-threaded tokio runtime, binds the listen port, and
/// serves connections. In-flight requests run to completion after
/// shutdown; only the accept loop stops.
pub fn run(config: &Config, cache: TieredCache, shutdown: ShutdownSignal) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let port = config.port;
    runtime.block_on(async move { serve(port, cache, shutdown).await })
}

async fn serve(port: u16, cache: TieredCache, shutdown: ShutdownSignal) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");

    let cache = Arc::new(cache);
    let stats_ticker = stats::spawn_stats_ticker(cache.clone());
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    CONNECTIONS_ACCEPTED.increment();
                    CONNECTIONS_ACTIVE.increment();
                    active.fetch_add(1, Ordering::SeqCst);
                    let cache = cache.clone();
                    let active = active.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, cache).await
                            && !is_connection_reset(&e)
                        {
                            tracing::warn!(%peer, error = %e, "connection error");
                        }
                        CONNECTIONS_ACTIVE.decrement();
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            },
        }
    }

    // Accepting has stopped; give in-flight connections a bounded window
    // to finish before the runtime is torn down.
    tracing::info!("accept loop stopped, draining connections");
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while active.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    stats_ticker.abort();
    Ok(())
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    cache: Arc<TieredCache>,
) -> std::io::Result<()> {
    let mut conn = Connection::new(peer);
    let mut read_buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match tokio::time::timeout(READ_IDLE_TIMEOUT, stream.read(&mut read_buf)).await {
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::debug!(%peer, "read idle timeout, closing connection");
                return Ok(());
            }
        };

        conn.receive(&read_buf[..n]);
        conn.process(&cache);

        let reply = conn.take_write();
        if !reply.is_empty() {
            stream.write_all(&reply).await?;
        }
        if conn.should_close() {
            return Ok(());
        }
    }
}

fn is_connection_reset(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}
