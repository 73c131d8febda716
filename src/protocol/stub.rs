//! In-process recognition server for tests.
//!
//! Binds to an ephemeral localhost port and answers every `audio-end` with a
//! transcript equal to the audio it just received, so a raw sample whose
//! bytes spell its own label is always recognised correctly.

use crate::protocol::messages::ControlMessage;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// How the stub answers an utterance.
#[derive(Debug, Clone)]
pub enum ReplyMode {
    /// Bare JSON echoing the audio
    Unframed,
    /// `DXTL` framed echo with the per-connection exchange count as the
    /// sequence tag; every 100th reply is followed by a redelivery
    Framed,
    /// Bare JSON with a fixed transcript
    Fixed(String),
    /// This exact text, whatever was sent
    Raw(String),
    /// The n-th utterance gets the n-th batch of messages verbatim; past the
    /// end of the script, unframed echo
    Script(Vec<Vec<String>>),
    /// Close the socket right after the handshake
    CloseImmediately,
}

/// Something the stub received.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Start,
    Audio(Vec<u8>),
    End,
    Ack(i64),
    Other(String),
}

pub struct StubServer {
    pub url: String,
    events: Arc<Mutex<Vec<ServerEvent>>>,
    connections: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn start(mode: ReplyMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_events = events.clone();
        let accept_connections = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(stream, mode.clone(), accept_events.clone()));
            }
        });

        Self {
            url: format!("ws://{}", addr),
            events,
            connections,
        }
    }

    pub fn events(&self) -> Vec<ServerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` events arrived (or about two seconds passed).
    pub async fn wait_for_events(&self, count: usize) {
        for _ in 0..200 {
            if self.events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn handle_connection(stream: TcpStream, mode: ReplyMode, events: Arc<Mutex<Vec<ServerEvent>>>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    if let ReplyMode::CloseImmediately = mode {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    let mut exchanges = 0i64;
    let mut audio = Vec::new();

    while let Some(Ok(message)) = read.next().await {
        match message {
            Message::Binary(data) => {
                events.lock().unwrap().push(ServerEvent::Audio(data.clone()));
                audio = data;
            }
            Message::Text(text) => match serde_json::from_str::<ControlMessage>(&text) {
                Ok(ControlMessage::AudioStart) => {
                    events.lock().unwrap().push(ServerEvent::Start);
                }
                Ok(ControlMessage::AudioEnd) => {
                    events.lock().unwrap().push(ServerEvent::End);
                    exchanges += 1;
                    for reply in replies(&mode, exchanges, &audio) {
                        if write.send(Message::Text(reply)).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(ControlMessage::ChatAck { sequence }) => {
                    events.lock().unwrap().push(ServerEvent::Ack(sequence));
                }
                Err(_) => {
                    events.lock().unwrap().push(ServerEvent::Other(text));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

fn replies(mode: &ReplyMode, exchange: i64, audio: &[u8]) -> Vec<String> {
    let body = |transcript: &str| json!({ "result": { "r0": transcript } }).to_string();
    let echo = String::from_utf8_lossy(audio).into_owned();

    match mode {
        ReplyMode::Unframed => vec![body(echo.as_str())],
        ReplyMode::Framed => {
            let mut out = vec![format!("DXTL stub:reply:{}\n{}", exchange, body(echo.as_str()))];
            if exchange % 100 == 0 {
                out.push(format!("DXTL replay:reply:{}\n{}", exchange, body(echo.as_str())));
            }
            out
        }
        ReplyMode::Fixed(transcript) => vec![body(transcript.as_str())],
        ReplyMode::Raw(text) => vec![text.clone()],
        ReplyMode::Script(batches) => batches
            .get((exchange - 1) as usize)
            .cloned()
            .unwrap_or_else(|| vec![body(echo.as_str())]),
        ReplyMode::CloseImmediately => Vec::new(),
    }
}
