//! A single chat connection as seen by the registry and the fan-out loop
//!
//! The write half of a connection lives behind an async mutex so the fan-out
//! loop and `close` never interleave. The lifecycle state is kept in an
//! atomic so the registry can retire a connection without awaiting.

use crate::error::{ChatError, Result};
use futures::{Sink, SinkExt, Stream};
use log::debug;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Outbound half of a transport, carrying encoded text frames
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ChatError> + Send>>;

/// Inbound half of a transport; the stream ends when the peer closes
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Bound on flushing a close to the peer
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Server-assigned identity of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a connection
///
/// Transitions only move forward: `Connecting -> Active -> Closing -> Closed`.
/// A connection that never registered goes straight from `Connecting` to
/// `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Active,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    state: AtomicU8,
    sink: Mutex<Option<FrameSink>>,
    closed: CancellationToken,
}

impl Connection {
    /// Wraps the outbound half of a transport
    ///
    /// `shutdown` is the server-wide token; the connection's own close signal
    /// is a child of it, so server shutdown also wakes the connection handler.
    pub fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        sink: FrameSink,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            id,
            peer,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            sink: Mutex::new(Some(sink)),
            closed: shutdown.child_token(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Moves `Connecting` to `Active`; false if the connection was already
    /// retired
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Marks the connection ineligible for delivery
    ///
    /// Returns true only for the call that performed the transition.
    pub(crate) fn retire(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= ConnectionState::Closing as u8 {
                return false;
            }
            match self.state.compare_exchange(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Writes one encoded frame, bounded by `timeout`
    ///
    /// The active check happens under the writer lock, so once a connection
    /// has been retired no new write reaches the transport.
    pub async fn send(&self, frame: String, timeout: Duration) -> Result<()> {
        let write = async {
            let mut guard = self.sink.lock().await;
            if !self.is_active() {
                return Err(ChatError::Closed);
            }
            let sink = guard.as_mut().ok_or(ChatError::Closed)?;
            sink.send(frame).await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::WriteTimeout(timeout)),
        }
    }

    /// Closes the write half and wakes the connection's handler
    ///
    /// Safe to call any number of times from any task.
    pub async fn close(&self) {
        self.close_within(CLOSE_TIMEOUT).await;
    }

    /// Like `close`, but gives the peer at most `timeout` to take the close
    pub async fn close_within(&self, timeout: Duration) {
        self.retire();
        self.closed.cancel();

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match tokio::time::timeout(timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("{} close error: {}", self.id, e),
                Err(_) => debug!("{} close timed out", self.id),
            }
        }

        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Resolves once the connection has been closed or the server shuts down
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}
