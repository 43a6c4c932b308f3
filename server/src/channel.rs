//! Broadcast channel between connection handlers and the fan-out loop
//!
//! Many producers, one consumer, FIFO. Whether enqueue can wait is decided
//! by `ChannelCapacity` at construction time.

use crate::config::ChannelCapacity;
use crate::error::{ChatError, Result};
use shared::ChatMessage;
use tokio::sync::mpsc;

/// Producer handle, cloned into every connection handler
#[derive(Debug, Clone)]
pub enum BroadcastSender {
    Unbounded(mpsc::UnboundedSender<ChatMessage>),
    Bounded(mpsc::Sender<ChatMessage>),
}

/// Consumer handle owned by the fan-out loop
#[derive(Debug)]
pub enum BroadcastReceiver {
    Unbounded(mpsc::UnboundedReceiver<ChatMessage>),
    Bounded(mpsc::Receiver<ChatMessage>),
}

pub fn broadcast_channel(capacity: ChannelCapacity) -> (BroadcastSender, BroadcastReceiver) {
    match capacity {
        ChannelCapacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (BroadcastSender::Unbounded(tx), BroadcastReceiver::Unbounded(rx))
        }
        ChannelCapacity::Bounded(size) => {
            let (tx, rx) = mpsc::channel(size.max(1));
            (BroadcastSender::Bounded(tx), BroadcastReceiver::Bounded(rx))
        }
    }
}

impl BroadcastSender {
    /// Enqueues a message for fan-out
    ///
    /// Fails only once the fan-out loop has gone away.
    pub async fn publish(&self, message: ChatMessage) -> Result<()> {
        match self {
            BroadcastSender::Unbounded(tx) => {
                tx.send(message).map_err(|_| ChatError::ChannelClosed)
            }
            BroadcastSender::Bounded(tx) => tx
                .send(message)
                .await
                .map_err(|_| ChatError::ChannelClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            BroadcastSender::Unbounded(tx) => tx.is_closed(),
            BroadcastSender::Bounded(tx) => tx.is_closed(),
        }
    }
}

impl BroadcastReceiver {
    /// Waits for the next message; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        match self {
            BroadcastReceiver::Unbounded(rx) => rx.recv().await,
            BroadcastReceiver::Bounded(rx) => rx.recv().await,
        }
    }

    /// Stops accepting new messages; already queued ones can still be read
    pub fn close(&mut self) {
        match self {
            BroadcastReceiver::Unbounded(rx) => rx.close(),
            BroadcastReceiver::Bounded(rx) => rx.close(),
        }
    }
}
