//! # Error Handling
//!
//! Error types for the tester, split by how far they are allowed to travel:
//!
//! - **TransportError**: the WebSocket failed, or an outbound control frame
//!   could not be built. Always fatal; it propagates up through the session
//!   and the orchestrator and ends the run.
//! - **ReplyError**: the server answered, but not in a shape we understand.
//!   Never fatal; the exchange is recorded as an error verdict instead.
//! - **TesterError**: everything that can stop the process (transport,
//!   configuration, I/O while loading samples, a panicked session task).
//!
//! Container-parsing problems have no error type at all: the WAVE walker
//! degrades to the best offset it found (see `audio::wave`).
//!
//! ## Rust Concepts:
//! - **enum + Display**: each variant carries the message, `Display` formats it
//! - **From trait**: lets `?` convert lower-level errors automatically
//! - **std::error::Error**: makes the types usable with `anyhow` at the edge

use std::fmt;

/// Failures of the duplex connection itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The WebSocket handshake (or TCP/TLS connect) failed
    Connect(String),

    /// Writing a frame failed
    Send(String),

    /// Reading a frame failed
    Receive(String),

    /// The peer closed the connection while we were waiting for a reply
    Closed,

    /// A control message could not be serialized, so nothing was written
    Encode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "Connect failed: {}", msg),
            TransportError::Send(msg) => write!(f, "Send failed: {}", msg),
            TransportError::Receive(msg) => write!(f, "Receive failed: {}", msg),
            TransportError::Closed => write!(f, "Connection closed by peer"),
            TransportError::Encode(msg) => write!(f, "Could not encode control message: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// A reply that could not be turned into a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyError {
    /// Framed reply ("DXTL...") with no newline ending the header line
    MissingHeaderTerminator,

    /// Header line split into fewer than three fields
    TooFewHeaderFields(usize),

    /// Third header field is not an integer
    InvalidSequence(String),

    /// Body is not `{"result": {...}}` JSON
    InvalidBody(String),

    /// Body parsed but has no `r0` entry
    MissingTranscript,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::MissingHeaderTerminator => {
                write!(f, "Framed reply has no header terminator")
            }
            ReplyError::TooFewHeaderFields(count) => {
                write!(f, "Framed reply header has {} fields, expected at least 3", count)
            }
            ReplyError::InvalidSequence(field) => {
                write!(f, "Framed reply sequence is not an integer: {:?}", field)
            }
            ReplyError::InvalidBody(msg) => write!(f, "Reply body is not valid JSON: {}", msg),
            ReplyError::MissingTranscript => write!(f, "Reply has no r0 transcript"),
        }
    }
}

impl std::error::Error for ReplyError {}

impl From<serde_json::Error> for ReplyError {
    fn from(err: serde_json::Error) -> Self {
        ReplyError::InvalidBody(err.to_string())
    }
}

/// Errors that end the run.
#[derive(Debug)]
pub enum TesterError {
    /// A session's connection failed
    Transport(TransportError),

    /// Configuration was rejected before any connection was made
    Config(String),

    /// Reading a sample file failed
    Io(String),

    /// A session task panicked or was cancelled
    Task(String),
}

impl fmt::Display for TesterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TesterError::Transport(err) => write!(f, "Transport error: {}", err),
            TesterError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TesterError::Io(msg) => write!(f, "I/O error: {}", msg),
            TesterError::Task(msg) => write!(f, "Session task error: {}", msg),
        }
    }
}

impl std::error::Error for TesterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TesterError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for TesterError {
    fn from(err: TransportError) -> Self {
        TesterError::Transport(err)
    }
}

impl From<tokio::task::JoinError> for TesterError {
    fn from(err: tokio::task::JoinError) -> Self {
        TesterError::Task(err.to_string())
    }
}

/// Shorthand for results that can end the run.
pub type TesterResult<T> = Result<T, TesterError>;
