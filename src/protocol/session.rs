//! # Streaming Protocol Session
//!
//! One session owns one WebSocket connection and drives utterances through
//! it, one exchange at a time.
//!
//! ## Exchange Lifecycle:
//! ```text
//! Idle ─► StartSent ─► Streaming ─► EndSent ─► AwaitingReply ─► Done
//! ```
//! 1. **StartSent**: `{"messageType":"audio-start"}`
//! 2. **Streaming**: the sample's payload as a single binary frame
//! 3. **EndSent**: `{"messageType":"audio-end"}`
//! 4. **AwaitingReply**: exactly one inbound data message, then the ack
//!    sub-protocol for framed replies
//! 5. **Done**: how the reply was acknowledged is recorded on the returned
//!    [`Exchange`] as an [`AckOutcome`]
//!
//! ## Ack Sub-protocol:
//! Framed replies (starting with `DXTL`) are acknowledged with `chat-ack`,
//! except on every 100th iteration where the ack is withheld and the
//! server's redelivery is read instead. Whether to skip depends only on the
//! prefix and the iteration, so a framed reply with an unreadable header
//! still has its redelivery consumed.
//!
//! ## Failure Semantics:
//! Any transport error is returned as [`TransportError`] and ends the run.
//! A reply that cannot be understood only produces an error verdict.

use crate::audio::{locate_payload, AudioSample};
use crate::error::{ReplyError, TransportError};
use crate::protocol::messages::{extract_transcript, ControlMessage};
use crate::protocol::reply::Reply;
use futures_util::{Sink, SinkExt, Stream, StreamExt};  // send()/next() on the split socket
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Every iteration index divisible by this withholds its ack.
pub const ACK_SKIP_INTERVAL: u32 = 100;

/// Pause before reading the redelivered reply on a skipped ack.
pub const SKIP_ACK_DELAY: Duration = Duration::from_millis(10);

/// Where the current exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    StartSent,
    Streaming,
    EndSent,
    AwaitingReply,
    Done,
}

/// What happened to the acknowledgment for one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// Unframed reply: nothing to acknowledge
    NotFramed,

    /// `chat-ack` sent with this sequence tag
    Sent(i64),

    /// Ack withheld; `replay` is the redelivered message that was read
    /// instead. `sequence` is `None` when the header could not be parsed.
    Skipped {
        sequence: Option<i64>,
        replay: Vec<u8>,
    },

    /// Framed reply whose header could not be parsed; no ack possible
    Unparseable,
}

/// Outcome of one exchange, as counted by the tally.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Transcript equals the expected label (ignoring case)
    Success { transcript: String },

    /// Transcript present but different
    Mismatch { transcript: String },

    /// Reply could not be interpreted
    Error(ReplyError),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }
}

/// Record of one completed request/response cycle.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// 1-based iteration index for this sample
    pub iteration: u32,

    /// Size of the binary frame that was sent
    pub bytes_sent: usize,

    /// Primary reply exactly as received
    pub reply: Vec<u8>,

    /// Terminal state of the ack sub-protocol for this reply
    pub ack: AckOutcome,

    pub verdict: Verdict,
}

/// Whether this iteration withholds its ack.
pub fn is_skip_ack(iteration: u32) -> bool {
    iteration % ACK_SKIP_INTERVAL == 0
}

/// Serialize a control message for the wire.
///
/// Kept apart from [`TransportError::Send`]: a message that cannot be
/// encoded never reached the socket.
pub fn encode_control(message: &ControlMessage) -> Result<String, TransportError> {
    message
        .to_json()
        .map_err(|e| TransportError::Encode(e.to_string()))
}

/// Live WebSocket connection as returned by [`connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a connection to `url` (`ws://` or `wss://`) and wrap it in a session.
pub async fn connect(id: usize, url: &str) -> Result<ProtocolSession<WsStream>, TransportError> {
    info!("[{}] Connecting to {}", id, url);
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connect(format!("{}: {}", url, e)))?;
    Ok(ProtocolSession::new(id, stream))
}

/// Protocol driver over any message stream/sink pair.
///
/// ## Rust Concepts:
/// - **Generic `S`**: the session only needs "something that yields
///   messages and accepts messages", so the same code runs over plain TCP,
///   TLS, or an in-memory test socket
/// - **Trait bounds in `where`**: `Stream` gives `next()`, `Sink` gives
///   `send()`/`close()`, `Unpin` lets us call them through `&mut self`
///
/// ## Ownership:
/// The session owns the socket outright. Only one exchange can be in flight
/// because every method takes `&mut self`.
pub struct ProtocolSession<S> {
    id: usize,
    stream: S,
    state: ExchangeState,
}

impl<S> ProtocolSession<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    pub fn new(id: usize, stream: S) -> Self {
        Self {
            id,
            stream,
            state: ExchangeState::Idle,
        }
    }

    /// Session number used as the log prefix.
    pub fn id(&self) -> usize {
        self.id
    }

    /// State of the most recent exchange.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Run one exchange for `sample` on this connection.
    ///
    /// ## What this does:
    /// 1. Send `audio-start`
    /// 2. Locate the payload (WAVE header stripped) and send it as one binary frame
    /// 3. Send `audio-end`
    /// 4. Read exactly one data message as the reply
    /// 5. Run the ack sub-protocol if the reply is framed
    /// 6. Compare the transcript with the sample's label
    ///
    /// ## Rust Concepts:
    /// - **`?` on `TransportError`**: any socket failure returns early and
    ///   ends the session
    /// - **`Result` as data**: reply problems are *not* returned as `Err`;
    ///   they become `Verdict::Error` so the run keeps going
    ///
    /// ## Why the reply is always consumed in full:
    /// The server redelivers a framed reply whose ack was withheld. If that
    /// redelivery were left unread, the next exchange would take it as its
    /// own reply and every later verdict on the connection would be off by one.
    pub async fn run_exchange(
        &mut self,
        sample: &AudioSample,
        iteration: u32,
    ) -> Result<Exchange, TransportError> {
        self.state = ExchangeState::Idle;

        self.send_control(&ControlMessage::AudioStart).await?;
        self.state = ExchangeState::StartSent;

        let location = locate_payload(&sample.data);
        let payload = location.payload(&sample.data);
        debug!("[{}] Sending audio data ({} bytes)", self.id, payload.len());
        self.send(Message::Binary(payload.to_vec())).await?;
        self.state = ExchangeState::Streaming;

        self.send_control(&ControlMessage::AudioEnd).await?;
        self.state = ExchangeState::EndSent;

        debug!("[{}] Awaiting reply for iteration {}", self.id, iteration);
        self.state = ExchangeState::AwaitingReply;
        let reply = self.receive().await?;

        let (ack, verdict) = match Reply::parse(&reply) {
            Ok(parsed) => {
                let ack = if parsed.is_framed() {
                    self.acknowledge(parsed.sequence, iteration).await?
                } else {
                    AckOutcome::NotFramed
                };
                (ack, judge(sample, extract_transcript(parsed.body)))
            }
            Err(err) => {
                // Only framed replies fail to parse; they still go through the ack sub-protocol
                let ack = self.acknowledge(None, iteration).await?;
                (ack, Verdict::Error(err))
            }
        };

        match &verdict {
            Verdict::Success { transcript } => {
                info!("[{}] SUCCESS: {}", self.id, transcript);
            }
            Verdict::Mismatch { .. } => {
                warn!("[{}] FAILURE: {}", self.id, String::from_utf8_lossy(&reply));
            }
            Verdict::Error(err) => {
                warn!(
                    "[{}] FAILURE ({}): {}",
                    self.id,
                    err,
                    String::from_utf8_lossy(&reply)
                );
            }
        }

        self.state = ExchangeState::Done;

        Ok(Exchange {
            iteration,
            bytes_sent: payload.len(),
            reply,
            ack,
            verdict,
        })
    }

    /// Ack sub-protocol for a framed reply.
    ///
    /// ## Decision table:
    /// | skip iteration | sequence known | action                           |
    /// |----------------|----------------|----------------------------------|
    /// | yes            | either         | wait, read redelivery, no ack    |
    /// | no             | yes            | send `chat-ack`                  |
    /// | no             | no             | nothing (no tag to acknowledge)  |
    ///
    /// ## Rust Concepts:
    /// - **`Option<i64>`**: the tag is optional because a malformed header
    ///   still counts as framed
    /// - **`tokio::time::sleep`**: yields to the runtime instead of blocking
    ///   the worker thread
    async fn acknowledge(
        &mut self,
        sequence: Option<i64>,
        iteration: u32,
    ) -> Result<AckOutcome, TransportError> {
        if is_skip_ack(iteration) {
            match sequence {
                Some(sequence) => info!("[{}] [Skip Ack] {}", self.id, sequence),
                None => info!("[{}] [Skip Ack] (unreadable header)", self.id),
            }
            tokio::time::sleep(SKIP_ACK_DELAY).await;

            let replay = self.receive().await?;
            info!("[{}] [Received|Replay] {}", self.id, String::from_utf8_lossy(&replay));

            return Ok(AckOutcome::Skipped { sequence, replay });
        }

        let Some(sequence) = sequence else {
            return Ok(AckOutcome::Unparseable);
        };

        self.send_control(&ControlMessage::ChatAck { sequence }).await?;
        Ok(AckOutcome::Sent(sequence))
    }

    async fn send_control(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        let text = encode_control(message)?;

        match message {
            ControlMessage::ChatAck { .. } => info!("[{}] [Sent|Ack] {}", self.id, text),
            _ => debug!("[{}] Sending message {}", self.id, text),
        }

        self.send(Message::Text(text)).await
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Wait for the next data message. Ping/pong frames are skipped; the
    /// underlying socket answers pings on its own.
    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }

    /// Send a close frame. Failures are only logged; the run is over anyway.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close().await {
            debug!("[{}] Close failed: {}", self.id, e);
        }
    }
}

/// Compare the extracted transcript with the sample's label.
fn judge(sample: &AudioSample, transcript: Result<String, ReplyError>) -> Verdict {
    match transcript {
        Ok(transcript) if sample.matches(&transcript) => Verdict::Success { transcript },
        Ok(transcript) => Verdict::Mismatch { transcript },
        Err(err) => Verdict::Error(err),
    }
}
