//! Per-connection task: register, read and enqueue, then clean up
//!
//! A handler walks its connection through `Connecting -> Active -> Closing ->
//! Closed`. Any read problem (peer hang-up, transport error, malformed
//! payload) ends the active phase; cleanup always removes the connection
//! from the registry before closing it.

use crate::channel::BroadcastSender;
use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::ChatError;
use crate::registry::Registry;
use futures::StreamExt;
use log::{debug, info, warn};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Why a connection handler finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The registry refused the connection
    Rejected(String),
    /// The peer ended the stream
    PeerClosed,
    ReadFailed(String),
    DecodeFailed(String),
    /// The fan-out loop closed the connection after a failed write
    ClosedByServer,
    ChannelClosed,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Rejected(reason) => write!(f, "rejected: {}", reason),
            CloseReason::PeerClosed => write!(f, "peer closed the connection"),
            CloseReason::ReadFailed(reason) => write!(f, "read failed: {}", reason),
            CloseReason::DecodeFailed(reason) => write!(f, "decode failed: {}", reason),
            CloseReason::ClosedByServer => write!(f, "closed by server"),
            CloseReason::ChannelClosed => write!(f, "broadcast channel closed"),
            CloseReason::Shutdown => write!(f, "server shutting down"),
        }
    }
}

pub struct ConnectionHandler {
    registry: Arc<Registry>,
    broadcast: BroadcastSender,
    connection: Arc<Connection>,
    stream: FrameStream,
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(
        registry: Arc<Registry>,
        broadcast: BroadcastSender,
        sink: FrameSink,
        stream: FrameStream,
        peer: Option<SocketAddr>,
        shutdown: CancellationToken,
    ) -> Self {
        let connection = Arc::new(Connection::new(registry.next_id(), peer, sink, &shutdown));
        Self {
            registry,
            broadcast,
            connection,
            stream,
            shutdown,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub async fn run(mut self) -> CloseReason {
        let id = self.connection.id();

        if let Err(e) = self.registry.add(Arc::clone(&self.connection)).await {
            warn!("{} rejected: {}", id, e);
            self.connection.close().await;
            return CloseReason::Rejected(e.to_string());
        }

        let reason = self.read_loop().await;

        self.registry.remove(id).await;
        self.connection.close().await;

        info!("{} closed: {}", id, reason);
        reason
    }

    async fn read_loop(&mut self) -> CloseReason {
        let id = self.connection.id();

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.connection.closed() => return self.closed_reason(),
                frame = self.stream.next() => frame,
            };

            let message = match frame {
                None => return CloseReason::PeerClosed,
                Some(Err(ChatError::Decode(e))) => return CloseReason::DecodeFailed(e.to_string()),
                Some(Err(e)) => return CloseReason::ReadFailed(e.to_string()),
                Some(Ok(text)) => match shared::decode(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("{} sent a malformed payload: {}", id, e);
                        return CloseReason::DecodeFailed(e.to_string());
                    }
                },
            };

            debug!("{} received message from {}", id, message.username);

            let published = tokio::select! {
                biased;
                _ = self.connection.closed() => return self.closed_reason(),
                result = self.broadcast.publish(message) => result,
            };
            if published.is_err() {
                return CloseReason::ChannelClosed;
            }
        }
    }

    fn closed_reason(&self) -> CloseReason {
        if self.shutdown.is_cancelled() {
            CloseReason::Shutdown
        } else {
            CloseReason::ClosedByServer
        }
    }
}
