//! Per-connection state and frame processing.
//!
//! A [`Connection`] accumulates bytes from the socket, drains every
//! complete RESP frame through the executor, and buffers replies until
//! the runtime flushes them. A malformed frame produces a single
//! `-ERR Invalid command` reply and marks the connection for close.

use crate::execute;
use crate::metrics::PROTOCOL_ERRORS;
use bytes::{Bytes, BytesMut};
use cache_core::TieredCache;
use protocol_resp::{Command, Frame, ParseError};
use std::net::SocketAddr;

/// Initial receive buffer capacity per connection.
const RECV_BUF_CAPACITY: usize = 16 * 1024;

/// A receive buffer that compacts consumed bytes lazily.
struct RecvBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl RecvBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    /// Append bytes, compacting first once half the buffer is dead.
    fn append(&mut self, new_data: &[u8]) {
        if self.offset > self.data.len() / 2 && self.offset > 0 {
            self.data.drain(..self.offset);
            self.offset = 0;
        }
        self.data.extend_from_slice(new_data);
    }

    fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    fn consume(&mut self, n: usize) {
        self.offset += n;
        if self.offset >= self.data.len() {
            self.data.clear();
            self.offset = 0;
        }
    }
}

/// State for one client connection.
pub struct Connection {
    peer: SocketAddr,
    recv: RecvBuffer,
    write_buf: BytesMut,
    should_close: bool,
}

impl Connection {
    /// Create connection state for a peer.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            recv: RecvBuffer::with_capacity(RECV_BUF_CAPACITY),
            write_buf: BytesMut::new(),
            should_close: false,
        }
    }

    /// Append freshly-read bytes from the socket.
    pub fn receive(&mut self, data: &[u8]) {
        self.recv.append(data);
    }

    /// Parse and execute every complete frame in the receive buffer.
    ///
    /// A framing error closes the connection after one `-ERR` reply; a
    /// well-framed but invalid command (unknown name, wrong arity,
    /// non-integer argument) gets its own `-ERR` reply and the
    /// connection keeps serving.
    pub fn process(&mut self, cache: &TieredCache) {
        while !self.should_close {
            let (frame, consumed) = match Frame::parse(self.recv.as_slice()) {
                Ok(parsed) => parsed,
                Err(ParseError::Incomplete) => break,
                Err(e) => {
                    PROTOCOL_ERRORS.increment();
                    tracing::debug!(peer = %self.peer, error = %e, "protocol error");
                    self.write_buf.extend_from_slice(b"-ERR Invalid command\r\n");
                    self.should_close = true;
                    break;
                }
            };

            match Command::from_frame(&frame) {
                Ok(command) => {
                    self.should_close =
                        execute::execute(&command, cache, self.peer, &mut self.write_buf);
                }
                Err(e) => {
                    PROTOCOL_ERRORS.increment();
                    self.write_buf.extend_from_slice(b"-ERR ");
                    self.write_buf.extend_from_slice(e.to_string().as_bytes());
                    self.write_buf.extend_from_slice(b"\r\n");
                }
            }
            self.recv.consume(consumed);
        }
    }

    /// Whether the connection should be closed after the pending reply is
    /// flushed.
    #[inline]
    pub fn should_close(&self) -> bool {
        self.should_close
    }

    /// Take the buffered reply bytes for writing.
    pub fn take_write(&mut self) -> Bytes {
        self.write_buf.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache(dir: &TempDir) -> TieredCache {
        TieredCache::builder()
            .partitions(2)
            .capacity(4096)
            .disk_root(dir.path())
            .build()
            .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_complete_frame_executes() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        conn.receive(b"*1\r\n$4\r\nPING\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"+PONG\r\n");
        assert!(!conn.should_close());
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        conn.receive(b"*1\r\n$4\r\nPI");
        conn.process(&cache);
        assert!(conn.take_write().is_empty());

        conn.receive(b"NG\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"+PONG\r\n");
    }

    #[test]
    fn test_pipelined_frames_all_execute() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        conn.receive(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"+OK\r\n$1\r\nv\r\n");
    }

    #[test]
    fn test_malformed_frame_replies_and_closes() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        conn.receive(b"GET k\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"-ERR Invalid command\r\n");
        assert!(conn.should_close());
    }

    #[test]
    fn test_bad_command_keeps_connection_open() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        // Unknown command, then wrong arity: each gets its own error and
        // the connection keeps serving.
        conn.receive(b"*1\r\n$5\r\nHELLO\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"-ERR unknown command 'HELLO'\r\n");
        assert!(!conn.should_close());

        conn.receive(b"*1\r\n$3\r\nGET\r\n*1\r\n$4\r\nPING\r\n");
        conn.process(&cache);
        assert_eq!(
            conn.take_write().as_ref(),
            b"-ERR wrong number of arguments for 'get' command\r\n+PONG\r\n"
        );
        assert!(!conn.should_close());
    }

    #[test]
    fn test_quit_closes_after_reply() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir);
        let mut conn = Connection::new(peer());

        conn.receive(b"*1\r\n$4\r\nQUIT\r\n");
        conn.process(&cache);
        assert_eq!(conn.take_write().as_ref(), b"+BYE\r\n");
        assert!(conn.should_close());
    }
}
