//! Parse error types.

use thiserror::Error;

/// Errors produced while parsing a RESP frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// More data is needed to complete the frame.
    #[error("incomplete frame")]
    Incomplete,

    /// The frame violates RESP framing rules.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A recognized command was given the wrong number of arguments.
    #[error("{0}")]
    WrongArity(String),

    /// The command name is not recognized.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// An integer field could not be parsed.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// A bulk string exceeds the configured limit.
    #[error("bulk string too long")]
    BulkStringTooLong,
}
