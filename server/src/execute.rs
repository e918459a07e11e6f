//! Command execution - bridges protocol commands to cache operations.

use crate::metrics::{DELETES, GETS, HITS, INCRS, MISSES, SET_ERRORS, SETS};
use bytes::{Bytes, BytesMut};
use cache_core::TieredCache;
use protocol_resp::Command;
use std::net::SocketAddr;

/// Execute a command against the cache, appending the RESP reply to
/// `write_buf`. Returns `true` when the connection should close after the
/// reply is flushed.
pub fn execute(
    cmd: &Command<'_>,
    cache: &TieredCache,
    peer: SocketAddr,
    write_buf: &mut BytesMut,
) -> bool {
    match cmd {
        Command::Ping => {
            write_buf.extend_from_slice(b"+PONG\r\n");
        }

        Command::Quit => {
            write_buf.extend_from_slice(b"+BYE\r\n");
            return true;
        }

        Command::Client { subcommand, args } => {
            client_stub(*subcommand, args, peer, write_buf);
        }

        Command::Get { key } => {
            GETS.increment();
            match cache.get(key) {
                Ok(Some(value)) => {
                    HITS.increment();
                    write_bulk_string(write_buf, &value);
                }
                Ok(None) => {
                    MISSES.increment();
                    write_null_bulk_string(write_buf);
                }
                Err(e) => write_error(write_buf, &e.to_string()),
            }
        }

        Command::Set { key, value } => {
            SETS.increment();
            match cache.put(key, Bytes::copy_from_slice(value)) {
                Ok(()) => write_buf.extend_from_slice(b"+OK\r\n"),
                Err(e) => {
                    SET_ERRORS.increment();
                    write_error(write_buf, &e.to_string());
                }
            }
        }

        Command::Del { keys } | Command::Unlink { keys } => {
            let mut deleted = 0i64;
            for key in keys {
                DELETES.increment();
                match cache.evict(key) {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "evict failed");
                    }
                }
            }
            write_integer(write_buf, deleted);
        }

        Command::Incr { key } => {
            increment(cache, key, 1, write_buf);
        }

        Command::IncrBy { key, increment: by } => {
            increment(cache, key, *by, write_buf);
        }
    }
    false
}

/// INCR/INCRBY: an absent key counts as zero; a present value must be a
/// base-10 integer. The sum is written back as ASCII decimal.
fn increment(cache: &TieredCache, key: &[u8], by: i64, write_buf: &mut BytesMut) {
    INCRS.increment();

    let current = match cache.get(key) {
        Ok(current) => current,
        Err(e) => {
            write_error(write_buf, &e.to_string());
            return;
        }
    };

    let new_value = match current {
        None => by,
        Some(raw) => {
            let parsed = std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.parse::<i64>().ok());
            let Some(current) = parsed else {
                write_error(write_buf, "value is not an integer");
                return;
            };
            let Some(sum) = current.checked_add(by) else {
                write_error(write_buf, "increment or decrement would overflow");
                return;
            };
            sum
        }
    };

    let mut formatted = itoa::Buffer::new();
    let encoded = formatted.format(new_value);
    match cache.put(key, Bytes::copy_from_slice(encoded.as_bytes())) {
        Ok(()) => write_integer(write_buf, new_value),
        Err(e) => write_error(write_buf, &e.to_string()),
    }
}

/// Minimal CLIENT compatibility stubs.
fn client_stub(
    subcommand: Option<&[u8]>,
    args: &[&[u8]],
    peer: SocketAddr,
    write_buf: &mut BytesMut,
) {
    let Some(subcommand) = subcommand else {
        write_buf.extend_from_slice(b"+OK\r\n");
        return;
    };

    if subcommand.eq_ignore_ascii_case(b"list") {
        let info = format!("id=1 addr={peer} age=0 idle=0 flags=N");
        write_bulk_string(write_buf, info.as_bytes());
    } else if subcommand.eq_ignore_ascii_case(b"setname") {
        if args.is_empty() {
            write_error(write_buf, "wrong number of arguments for 'client setname'");
        } else {
            write_buf.extend_from_slice(b"+OK\r\n");
        }
    } else if subcommand.eq_ignore_ascii_case(b"getname") {
        write_bulk_string(write_buf, b"");
    } else {
        write_buf.extend_from_slice(b"+OK\r\n");
    }
}

fn write_bulk_string(buf: &mut BytesMut, value: &[u8]) {
    let mut len = itoa::Buffer::new();
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(len.format(value.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

fn write_null_bulk_string(buf: &mut BytesMut) {
    buf.extend_from_slice(b"$-1\r\n");
}

fn write_integer(buf: &mut BytesMut, value: i64) {
    let mut formatted = itoa::Buffer::new();
    buf.extend_from_slice(b":");
    buf.extend_from_slice(formatted.format(value).as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn write_error(buf: &mut BytesMut, message: &str) {
    buf.extend_from_slice(b"-ERR ");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
}
