//! Server-side command parsing.
//!
//! Parsing happens in two stages so callers can tell framing problems
//! from bad commands:
//!
//! 1. [`Frame::parse`] reads one `*<n>\r\n$<len>\r\n...` array of bulk
//!    strings. Its errors ([`ParseError::Incomplete`], framing
//!    violations) mean the byte stream itself is unusable.
//! 2. [`Command::from_frame`] interprets the frame. Its errors (unknown
//!    command, wrong arity, non-integer argument) describe a well-framed
//!    but invalid request; the connection can report them and keep going.
//!
//! Both stages are zero-copy: frames and commands reference slices of
//! the input buffer.

use crate::error::ParseError;

/// Default cap on a single bulk string (512 MB, the classic Redis value
/// limit).
const DEFAULT_MAX_BULK_STRING_LEN: usize = 512 * 1024 * 1024;

/// Cap on the number of array elements in one frame.
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Limits applied while parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Maximum accepted bulk string length in bytes.
    pub max_bulk_string_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_bulk_string_len: DEFAULT_MAX_BULK_STRING_LEN,
        }
    }
}

/// One RESP request frame: an array of bulk strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    parts: Vec<&'a [u8]>,
}

impl<'a> Frame<'a> {
    /// Parse one frame using default limits.
    ///
    /// Returns the frame and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Incomplete`] if more data is needed, and
    /// framing errors for anything that is not an array of bulk strings.
    #[inline]
    pub fn parse(buffer: &'a [u8]) -> Result<(Self, usize), ParseError> {
        Self::parse_with_options(buffer, &ParseOptions::default())
    }

    /// Parse one frame with custom limits.
    pub fn parse_with_options(
        buffer: &'a [u8],
        options: &ParseOptions,
    ) -> Result<(Self, usize), ParseError> {
        let mut cursor = Cursor::new(buffer, options.max_bulk_string_len);

        if cursor.remaining() < 1 {
            return Err(ParseError::Incomplete);
        }
        if cursor.get_u8() != b'*' {
            return Err(ParseError::Protocol("expected array".to_string()));
        }

        let count = cursor.read_integer()?;
        if count < 1 {
            return Err(ParseError::Protocol(
                "array must have at least 1 element".to_string(),
            ));
        }
        if count > MAX_ARRAY_LEN {
            return Err(ParseError::Protocol("array too large".to_string()));
        }

        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(cursor.read_bulk_string()?);
        }

        Ok((Self { parts }, cursor.position()))
    }

    /// The frame's elements; the first is the command name.
    #[inline]
    pub fn parts(&self) -> &[&'a [u8]] {
        &self.parts
    }
}

/// A parsed command with references into the original buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// PING
    Ping,
    /// QUIT
    Quit,
    /// CLIENT [subcommand [args...]]
    Client {
        /// Subcommand (LIST, SETNAME, GETNAME, ...), if given.
        subcommand: Option<&'a [u8]>,
        /// Arguments after the subcommand.
        args: Vec<&'a [u8]>,
    },
    /// GET key
    Get {
        /// Key to look up.
        key: &'a [u8],
    },
    /// SET key value
    Set {
        /// Key to store under.
        key: &'a [u8],
        /// Value bytes.
        value: &'a [u8],
    },
    /// DEL key [key ...]
    Del {
        /// Keys to remove.
        keys: Vec<&'a [u8]>,
    },
    /// UNLINK key [key ...]
    Unlink {
        /// Keys to remove.
        keys: Vec<&'a [u8]>,
    },
    /// INCR key
    Incr {
        /// Key holding the counter.
        key: &'a [u8],
    },
    /// INCRBY key increment
    IncrBy {
        /// Key holding the counter.
        key: &'a [u8],
        /// Signed increment.
        increment: i64,
    },
}

impl<'a> Command<'a> {
    /// Parse one complete command from a byte buffer.
    ///
    /// Returns the parsed command and the number of bytes consumed.
    /// Convenience for [`Frame::parse`] followed by
    /// [`Command::from_frame`].
    #[inline]
    pub fn parse(buffer: &'a [u8]) -> Result<(Self, usize), ParseError> {
        let (frame, consumed) = Frame::parse(buffer)?;
        let command = Self::from_frame(&frame)?;
        Ok((command, consumed))
    }

    /// Interpret a frame as a command. Command-name matching is
    /// case-insensitive.
    pub fn from_frame(frame: &Frame<'a>) -> Result<Self, ParseError> {
        let parts = frame.parts();
        let count = parts.len();
        let cmd_str = std::str::from_utf8(parts[0])
            .map_err(|_| ParseError::Protocol("invalid UTF-8 in command".to_string()))?;

        let command = match () {
            _ if cmd_str.eq_ignore_ascii_case("ping") => {
                if count != 1 {
                    return Err(wrong_arity("ping"));
                }
                Command::Ping
            }

            _ if cmd_str.eq_ignore_ascii_case("quit") => {
                if count != 1 {
                    return Err(wrong_arity("quit"));
                }
                Command::Quit
            }

            _ if cmd_str.eq_ignore_ascii_case("client") => Command::Client {
                subcommand: parts.get(1).copied(),
                args: parts.get(2..).unwrap_or_default().to_vec(),
            },

            _ if cmd_str.eq_ignore_ascii_case("get") => {
                if count != 2 {
                    return Err(wrong_arity("get"));
                }
                Command::Get { key: parts[1] }
            }

            _ if cmd_str.eq_ignore_ascii_case("set") => {
                if count != 3 {
                    return Err(wrong_arity("set"));
                }
                Command::Set {
                    key: parts[1],
                    value: parts[2],
                }
            }

            // Zero keys is not an error: the executor replies :0.
            _ if cmd_str.eq_ignore_ascii_case("del") => Command::Del {
                keys: parts[1..].to_vec(),
            },

            _ if cmd_str.eq_ignore_ascii_case("unlink") => Command::Unlink {
                keys: parts[1..].to_vec(),
            },

            _ if cmd_str.eq_ignore_ascii_case("incr") => {
                if count != 2 {
                    return Err(wrong_arity("incr"));
                }
                Command::Incr { key: parts[1] }
            }

            _ if cmd_str.eq_ignore_ascii_case("incrby") => {
                if count != 3 {
                    return Err(wrong_arity("incrby"));
                }
                let increment = std::str::from_utf8(parts[2])
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        ParseError::InvalidInteger("increment must be an integer".to_string())
                    })?;
                Command::IncrBy {
                    key: parts[1],
                    increment,
                }
            }

            _ => {
                return Err(ParseError::UnknownCommand(cmd_str.to_string()));
            }
        };

        Ok(command)
    }

    /// The command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Quit => "QUIT",
            Command::Client { .. } => "CLIENT",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Del { .. } => "DEL",
            Command::Unlink { .. } => "UNLINK",
            Command::Incr { .. } => "INCR",
            Command::IncrBy { .. } => "INCRBY",
        }
    }

    /// Encode the command as a RESP array-of-bulk-strings frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut parts: Vec<Vec<u8>> = vec![self.name().as_bytes().to_vec()];
        match self {
            Command::Ping | Command::Quit => {}
            Command::Client { subcommand, args } => {
                if let Some(sub) = subcommand {
                    parts.push(sub.to_vec());
                }
                parts.extend(args.iter().map(|a| a.to_vec()));
            }
            Command::Get { key } | Command::Incr { key } => {
                parts.push(key.to_vec());
            }
            Command::Set { key, value } => {
                parts.push(key.to_vec());
                parts.push(value.to_vec());
            }
            Command::Del { keys } | Command::Unlink { keys } => {
                parts.extend(keys.iter().map(|k| k.to_vec()));
            }
            Command::IncrBy { key, increment } => {
                parts.push(key.to_vec());
                parts.push(increment.to_string().into_bytes());
            }
        }

        let mut out = format!("*{}\r\n", parts.len()).into_bytes();
        for part in parts {
            out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
            out.extend_from_slice(&part);
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

fn wrong_arity(name: &str) -> ParseError {
    ParseError::WrongArity(format!("wrong number of arguments for '{name}' command"))
}

/// A cursor for reading RESP data from a buffer.
struct Cursor<'a> {
    buffer: &'a [u8],
    pos: usize,
    max_bulk_string_len: usize,
}

impl<'a> Cursor<'a> {
    fn new(buffer: &'a [u8], max_bulk_string_len: usize) -> Self {
        Self {
            buffer,
            pos: 0,
            max_bulk_string_len,
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn get_u8(&mut self) -> u8 {
        let b = self.buffer[self.pos];
        self.pos += 1;
        b
    }

    /// Read bytes up to the next CRLF, consuming the CRLF.
    fn read_line(&mut self) -> Result<&'a [u8], ParseError> {
        let start = self.pos;
        let mut i = start;
        while i + 1 < self.buffer.len() {
            if self.buffer[i] == b'\r' && self.buffer[i + 1] == b'\n' {
                self.pos = i + 2;
                return Ok(&self.buffer[start..i]);
            }
            i += 1;
        }
        Err(ParseError::Incomplete)
    }

    /// Read an unsigned decimal integer terminated by CRLF.
    fn read_integer(&mut self) -> Result<usize, ParseError> {
        let line = self.read_line()?;

        if line.is_empty() {
            return Err(ParseError::InvalidInteger("empty integer".to_string()));
        }
        // usize::MAX has 20 digits; 19 cannot overflow mid-parse.
        if line.len() > 19 {
            return Err(ParseError::InvalidInteger("integer too large".to_string()));
        }

        let mut result = 0usize;
        for &byte in line {
            if !byte.is_ascii_digit() {
                return Err(ParseError::InvalidInteger(
                    "non-digit character".to_string(),
                ));
            }
            result = result * 10 + usize::from(byte - b'0');
        }
        Ok(result)
    }

    /// Read one `$<len>\r\n<bytes>\r\n` bulk string.
    fn read_bulk_string(&mut self) -> Result<&'a [u8], ParseError> {
        if self.remaining() < 1 {
            return Err(ParseError::Incomplete);
        }
        if self.get_u8() != b'$' {
            return Err(ParseError::Protocol("expected bulk string".to_string()));
        }

        let len = self.read_integer()?;
        if len > self.max_bulk_string_len {
            return Err(ParseError::BulkStringTooLong);
        }
        if self.remaining() < len + 2 {
            return Err(ParseError::Incomplete);
        }

        let data = &self.buffer[self.pos..self.pos + len];
        self.pos += len;
        if self.get_u8() != b'\r' || self.get_u8() != b'\n' {
            return Err(ParseError::Protocol(
                "bulk string missing CRLF terminator".to_string(),
            ));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> (Command<'_>, usize) {
        Command::parse(input).unwrap()
    }

    #[test]
    fn test_parse_ping() {
        let (cmd, consumed) = parse_all(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(cmd, Command::Ping);
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let (cmd, _) = parse_all(b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n");
        assert_eq!(cmd, Command::Get { key: b"k" });
        let (cmd, _) = parse_all(b"*2\r\n$3\r\nGeT\r\n$1\r\nk\r\n");
        assert_eq!(cmd, Command::Get { key: b"k" });
    }

    #[test]
    fn test_parse_set() {
        let (cmd, consumed) = parse_all(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
        assert_eq!(
            cmd,
            Command::Set {
                key: b"key",
                value: b"value"
            }
        );
        assert_eq!(consumed, 33);
    }

    #[test]
    fn test_parse_del_multiple_keys() {
        let (cmd, _) = parse_all(b"*3\r\n$3\r\nDEL\r\n$1\r\na\r\n$1\r\nb\r\n");
        assert_eq!(
            cmd,
            Command::Del {
                keys: vec![b"a", b"b"]
            }
        );
    }

    /// A bare DEL or UNLINK is not an arity error; it carries zero keys.
    #[test]
    fn test_parse_del_without_keys() {
        let (cmd, _) = parse_all(b"*1\r\n$3\r\nDEL\r\n");
        assert_eq!(cmd, Command::Del { keys: vec![] });
        let (cmd, _) = parse_all(b"*1\r\n$6\r\nUNLINK\r\n");
        assert_eq!(cmd, Command::Unlink { keys: vec![] });
    }

    #[test]
    fn test_parse_incrby() {
        let (cmd, _) = parse_all(b"*3\r\n$6\r\nINCRBY\r\n$1\r\nk\r\n$2\r\n-5\r\n");
        assert_eq!(
            cmd,
            Command::IncrBy {
                key: b"k",
                increment: -5
            }
        );
    }

    #[test]
    fn test_parse_incrby_non_integer() {
        let err = Command::parse(b"*3\r\n$6\r\nINCRBY\r\n$1\r\nk\r\n$3\r\nabc\r\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidInteger(_)));
    }

    #[test]
    fn test_parse_client_variants() {
        let (cmd, _) = parse_all(b"*1\r\n$6\r\nCLIENT\r\n");
        assert_eq!(
            cmd,
            Command::Client {
                subcommand: None,
                args: vec![]
            }
        );

        let (cmd, _) = parse_all(b"*3\r\n$6\r\nCLIENT\r\n$7\r\nSETNAME\r\n$2\r\nme\r\n");
        assert_eq!(
            cmd,
            Command::Client {
                subcommand: Some(b"SETNAME"),
                args: vec![b"me"]
            }
        );
    }

    #[test]
    fn test_incomplete_frames() {
        for input in [
            &b""[..],
            b"*",
            b"*2\r\n",
            b"*2\r\n$3\r\nGET\r\n",
            b"*2\r\n$3\r\nGET\r\n$5\r\nab",
        ] {
            assert_eq!(
                Command::parse(input).unwrap_err(),
                ParseError::Incomplete,
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_framing_errors() {
        assert!(matches!(
            Frame::parse(b"GET key\r\n").unwrap_err(),
            ParseError::Protocol(_)
        ));
        assert!(matches!(
            Frame::parse(b"*1\r\n+PING\r\n").unwrap_err(),
            ParseError::Protocol(_)
        ));
        assert!(matches!(
            Frame::parse(b"*x\r\n$4\r\nPING\r\n").unwrap_err(),
            ParseError::InvalidInteger(_)
        ));
    }

    /// Semantic errors surface after the frame was fully consumed, so
    /// the caller can skip the frame and keep the connection.
    #[test]
    fn test_semantic_error_after_full_frame() {
        let input = b"*1\r\n$5\r\nHELLO\r\n";
        let (frame, consumed) = Frame::parse(input).unwrap();
        assert_eq!(consumed, input.len());
        let err = Command::from_frame(&frame).unwrap_err();
        assert_eq!(err, ParseError::UnknownCommand("HELLO".to_string()));
    }

    #[test]
    fn test_wrong_arity() {
        for input in [
            &b"*1\r\n$3\r\nGET\r\n"[..],
            b"*2\r\n$3\r\nSET\r\n$1\r\nk\r\n",
            b"*2\r\n$4\r\nPING\r\n$1\r\nx\r\n",
            b"*3\r\n$4\r\nINCR\r\n$1\r\nk\r\n$1\r\n1\r\n",
        ] {
            let err = Command::parse(input).unwrap_err();
            assert!(
                matches!(err, ParseError::WrongArity(_)),
                "input {:?} gave {err:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_wrong_arity_message() {
        let err = Command::parse(b"*1\r\n$3\r\nGET\r\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "wrong number of arguments for 'get' command"
        );
    }

    #[test]
    fn test_bulk_string_limit() {
        let options = ParseOptions {
            max_bulk_string_len: 4,
        };
        let err = Frame::parse_with_options(b"*2\r\n$3\r\nGET\r\n$5\r\ntoooo\r\n", &options)
            .unwrap_err();
        assert_eq!(err, ParseError::BulkStringTooLong);
    }

    #[test]
    fn test_binary_safe_values() {
        let frame = b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$4\r\n\x00\x01\r\n\r\n";
        let (cmd, consumed) = parse_all(frame);
        assert_eq!(
            cmd,
            Command::Set {
                key: b"key",
                value: b"\x00\x01\r\n"
            }
        );
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_consumed_bytes_leave_pipelined_rest() {
        let mut frame = b"*1\r\n$4\r\nPING\r\n".to_vec();
        frame.extend_from_slice(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
        let (cmd, consumed) = Command::parse(&frame).unwrap();
        assert_eq!(cmd, Command::Ping);
        let (cmd, _) = Command::parse(&frame[consumed..]).unwrap();
        assert_eq!(cmd, Command::Get { key: b"k" });
    }

    /// Every recognized command survives an encode-then-parse round trip.
    #[test]
    fn test_encode_parse_roundtrip() {
        let commands = [
            Command::Ping,
            Command::Quit,
            Command::Client {
                subcommand: None,
                args: vec![],
            },
            Command::Client {
                subcommand: Some(b"LIST"),
                args: vec![],
            },
            Command::Client {
                subcommand: Some(b"SETNAME"),
                args: vec![b"conn-1"],
            },
            Command::Get { key: b"k" },
            Command::Set {
                key: b"k",
                value: b"v",
            },
            Command::Del {
                keys: vec![b"a", b"b", b"c"],
            },
            Command::Unlink { keys: vec![b"a"] },
            Command::Incr { key: b"counter" },
            Command::IncrBy {
                key: b"counter",
                increment: -42,
            },
        ];

        for original in commands {
            let encoded = original.encode();
            let (parsed, consumed) = Command::parse(&encoded).unwrap();
            assert_eq!(parsed, original);
            assert_eq!(consumed, encoded.len());
        }
    }
}
