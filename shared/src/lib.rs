use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const CHAT_PATH: &str = "/api/ws";

/// A single chat line as it travels over the wire.
///
/// Both fields default to empty strings when a client omits them, and any
/// extra fields are ignored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct ChatMessage {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed chat payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("chat payload is not valid UTF-8")]
    NotUtf8,
}

/// Encodes a message as a JSON text frame.
pub fn encode(message: &ChatMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Decodes a JSON text frame into a message.
pub fn decode(frame: &str) -> Result<ChatMessage, CodecError> {
    Ok(serde_json::from_str(frame)?)
}

/// Decodes a binary frame, which must hold UTF-8 JSON.
pub fn decode_bytes(frame: &[u8]) -> Result<ChatMessage, CodecError> {
    let text = std::str::from_utf8(frame).map_err(|_| CodecError::NotUtf8)?;
    decode(text)
}
