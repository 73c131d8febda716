//! # Streaming Recognition Protocol
//!
//! Client side of the recognition server's WebSocket protocol.
//!
//! ## Wire Summary:
//! - **Client → Server**: `audio-start` (text), audio payload (binary),
//!   `audio-end` (text), `chat-ack` (text, framed replies only)
//! - **Server → Client**: one reply per utterance, bare JSON or `DXTL` framed
//!
//! ## Modules:
//! - **messages**: JSON message types
//! - **reply**: framed/unframed reply splitting
//! - **session**: the per-connection exchange state machine

pub mod messages;   // Control messages and the result body
pub mod reply;      // "DXTL" framing parser
pub mod session;    // One connection, one exchange at a time

#[cfg(test)]
pub(crate) mod stub; // Loopback server for session and orchestrator tests

pub use session::{connect, Exchange, ProtocolSession, Verdict};
