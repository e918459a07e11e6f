//! RESP protocol parsing for PodCache.
//!
//! Parses the array-of-bulk-strings form of the Redis Serialization
//! Protocol (`*<n>\r\n` followed by `n` bulk strings) into a zero-copy
//! [`Command`]. Replies are written by the server; this crate only
//! understands requests.
//!
//! # Incremental parsing
//!
//! [`Frame::parse`] returns [`ParseError::Incomplete`] when the buffer
//! holds only part of a frame, and the number of consumed bytes on
//! success, so callers can accumulate reads and drain complete frames in
//! a loop. [`Command::from_frame`] then interprets a complete frame;
//! its errors describe a bad request rather than a bad byte stream.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod error;

pub use command::{Command, Frame, ParseOptions};
pub use error::ParseError;
