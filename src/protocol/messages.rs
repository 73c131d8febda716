//! Wire messages exchanged with the recognition server.
//!
//! Outbound control messages are JSON text frames tagged by `messageType`.
//! The reply body is `{"result": {"r0": "<transcript>", ...}}`.

use crate::error::ReplyError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key of the transcript inside the reply's `result` map.
pub const TRANSCRIPT_KEY: &str = "r0";

/// Text control messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum ControlMessage {
    /// Opens an utterance; audio follows as one binary frame
    #[serde(rename = "audio-start")]
    AudioStart,

    /// Closes the utterance; the server answers with one reply
    #[serde(rename = "audio-end")]
    AudioEnd,

    /// Acknowledges a framed reply by its sequence tag
    #[serde(rename = "chat-ack")]
    ChatAck {
        sequence: i64,
    },
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Recognition result as sent by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsrReply {
    #[serde(default)]
    pub result: HashMap<String, String>,
}

impl AsrReply {
    /// Parse a reply body. Leading whitespace (the newline kept after a
    /// framed header) is accepted.
    pub fn parse(body: &[u8]) -> Result<Self, ReplyError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The transcript, if the server sent one.
    pub fn transcript(&self) -> Option<&str> {
        self.result.get(TRANSCRIPT_KEY).map(String::as_str)
    }
}

/// Parse `body` and pull out the transcript.
pub fn extract_transcript(body: &[u8]) -> Result<String, ReplyError> {
    AsrReply::parse(body)?
        .transcript()
        .map(str::to_owned)
        .ok_or(ReplyError::MissingTranscript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_wire_format() {
        assert_eq!(
            ControlMessage::AudioStart.to_json().unwrap(),
            r#"{"messageType":"audio-start"}"#
        );
        assert_eq!(
            ControlMessage::AudioEnd.to_json().unwrap(),
            r#"{"messageType":"audio-end"}"#
        );
        assert_eq!(
            ControlMessage::ChatAck { sequence: 42 }.to_json().unwrap(),
            r#"{"messageType":"chat-ack","sequence":42}"#
        );
    }

    #[test]
    fn test_control_message_parses_back() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"messageType":"chat-ack","sequence":7}"#).unwrap();
        assert_eq!(msg, ControlMessage::ChatAck { sequence: 7 });
    }

    #[test]
    fn test_extract_transcript() {
        let body = br#"{"result":{"r0":"hello world","r1":"hollow world"}}"#;
        assert_eq!(extract_transcript(body).unwrap(), "hello world");

        // Framed bodies keep the newline that ended the header
        assert_eq!(extract_transcript(b"\n{\"result\":{\"r0\":\"hi\"}}").unwrap(), "hi");
    }

    #[test]
    fn test_extract_transcript_failures() {
        assert_eq!(
            extract_transcript(br#"{"result":{"r1":"x"}}"#),
            Err(ReplyError::MissingTranscript)
        );
        assert_eq!(extract_transcript(br#"{}"#), Err(ReplyError::MissingTranscript));
        assert!(matches!(
            extract_transcript(b"not json"),
            Err(ReplyError::InvalidBody(_))
        ));
        assert!(matches!(
            extract_transcript(br#"{"result":{"r0":5}}"#),
            Err(ReplyError::InvalidBody(_))
        ));
    }
}
