//! In-process transport for embedding the hub without sockets
//!
//! `in_memory` returns the two halves the hub consumes plus a `MemoryPeer`
//! that plays the remote client. Used by the unit and integration tests.

use crate::connection::{FrameSink, FrameStream};
use crate::error::{ChatError, Result};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use shared::ChatMessage;

/// Remote end of an in-memory transport
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Result<String>>>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
}

/// Creates a connected transport pair backed by unbounded channels
pub fn in_memory() -> (FrameSink, FrameStream, MemoryPeer) {
    let (out_tx, out_rx) = mpsc::unbounded::<String>();
    let (in_tx, in_rx) = mpsc::unbounded::<Result<String>>();

    let sink: FrameSink = Box::pin(out_tx.sink_map_err(|e| ChatError::Transport(e.to_string())));
    let stream: FrameStream = Box::pin(in_rx);

    let peer = MemoryPeer {
        inbound: Some(in_tx),
        outbound: Some(out_rx),
    };
    (sink, stream, peer)
}

/// Like `in_memory`, but every write blocks forever
///
/// Models a client that stopped reading.
pub fn stalled() -> (FrameSink, FrameStream, MemoryPeer) {
    let (_, stream, mut peer) = in_memory();
    peer.outbound = None;

    let sink: FrameSink = Box::pin(futures::sink::unfold((), |_, _frame: String| {
        futures::future::pending::<Result<()>>()
    }));
    (sink, stream, peer)
}

impl MemoryPeer {
    /// Delivers a raw frame to the server side; false once hung up
    pub fn send(&self, frame: impl Into<String>) -> bool {
        match &self.inbound {
            Some(tx) => tx.unbounded_send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    pub fn send_message(&self, message: &ChatMessage) -> bool {
        match shared::encode(message) {
            Ok(frame) => self.send(frame),
            Err(_) => false,
        }
    }

    /// Makes the server's next read fail with a transport error
    pub fn fail_read(&self, reason: &str) -> bool {
        match &self.inbound {
            Some(tx) => tx
                .unbounded_send(Err(ChatError::Transport(reason.to_string())))
                .is_ok(),
            None => false,
        }
    }

    /// Ends the server's read stream, like a peer disconnect
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Drops the receiving end so every server write fails
    pub fn break_outbound(&mut self) {
        self.outbound = None;
    }

    /// Waits for the next frame written by the server
    pub async fn recv(&mut self) -> Option<String> {
        match self.outbound.as_mut() {
            Some(rx) => rx.next().await,
            None => None,
        }
    }

    pub async fn recv_message(&mut self) -> Option<ChatMessage> {
        let frame = self.recv().await?;
        shared::decode(&frame).ok()
    }

    /// Returns a frame only if one is already queued
    pub fn try_recv(&mut self) -> Option<String> {
        match self.outbound.as_mut()?.try_next() {
            Ok(Some(frame)) => Some(frame),
            _ => None,
        }
    }
}
