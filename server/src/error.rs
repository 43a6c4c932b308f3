//! Error types for the chat server

use shared::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by connections, the broadcast channel and the server
///
/// Every variant except `Io` is local to a single connection; none of them
/// ever stops the fan-out loop.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("connection is closed")]
    Closed,
    #[error("registry is full ({0} connections)")]
    RegistryFull(usize),
    #[error("broadcast channel is closed")]
    ChannelClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
