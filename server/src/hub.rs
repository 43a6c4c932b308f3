//! The chat hub: one registry, one broadcast channel, one fan-out task
//!
//! `ChatHub` owns everything the fan-out core shares. It is cheap to clone;
//! clones refer to the same registry, channel and task set.

use crate::channel::{broadcast_channel, BroadcastSender};
use crate::config::ServerConfig;
use crate::connection::{FrameSink, FrameStream};
use crate::fanout::FanoutLoop;
use crate::handler::{CloseReason, ConnectionHandler};
use crate::registry::Registry;
use log::{info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct ChatHub {
    registry: Arc<Registry>,
    broadcast: BroadcastSender,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    aborts: Arc<std::sync::Mutex<Vec<AbortHandle>>>,
    fanout: Arc<Mutex<Option<JoinHandle<()>>>>,
    shutdown_grace: Duration,
}

impl ChatHub {
    /// Creates the registry and channel and spawns the fan-out loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.max_connections));
        let shutdown = CancellationToken::new();
        let (broadcast, receiver) = broadcast_channel(config.channel_capacity);

        let fanout = FanoutLoop::new(
            Arc::clone(&registry),
            receiver,
            config.write_timeout,
            shutdown.clone(),
        );
        let fanout_handle = tokio::spawn(fanout.run());

        info!(
            "Chat hub started (channel: {:?}, write timeout: {:?}, max connections: {})",
            config.channel_capacity, config.write_timeout, config.max_connections
        );

        Self {
            registry,
            broadcast,
            shutdown,
            tracker: TaskTracker::new(),
            aborts: Arc::new(std::sync::Mutex::new(Vec::new())),
            fanout: Arc::new(Mutex::new(Some(fanout_handle))),
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Hands a new connection to the hub and spawns its handler
    pub fn attach(
        &self,
        sink: FrameSink,
        stream: FrameStream,
        peer: Option<SocketAddr>,
    ) -> JoinHandle<CloseReason> {
        let handler = self.handler(sink, stream, peer);
        self.spawn_tracked(handler.run())
    }

    /// Builds a handler without spawning it
    pub fn handler(
        &self,
        sink: FrameSink,
        stream: FrameStream,
        peer: Option<SocketAddr>,
    ) -> ConnectionHandler {
        ConnectionHandler::new(
            Arc::clone(&self.registry),
            self.broadcast.clone(),
            sink,
            stream,
            peer,
            self.shutdown.clone(),
        )
    }

    /// Spawns connection-scoped work that shutdown should wait for
    pub(crate) fn spawn_tracked<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = self.tracker.spawn(task);
        let mut aborts = self.aborts.lock().unwrap_or_else(PoisonError::into_inner);
        aborts.retain(|abort| !abort.is_finished());
        aborts.push(handle.abort_handle());
        handle
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// A producer handle onto the broadcast channel
    pub fn sender(&self) -> BroadcastSender {
        self.broadcast.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signals every task to stop and waits for them
    ///
    /// Queued messages that were not yet delivered are dropped. Tasks still
    /// running when the grace period ends are aborted.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        let deadline = Instant::now() + self.shutdown_grace;

        if tokio::time::timeout_at(deadline, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Aborting {} connection tasks still running after {:?}",
                self.tracker.len(),
                self.shutdown_grace
            );
            let aborts: Vec<AbortHandle> = self
                .aborts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();
            for abort in aborts {
                abort.abort();
            }
            self.tracker.wait().await;
        }

        let fanout = self.fanout.lock().await.take();
        if let Some(mut handle) = fanout {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Fan-out task failed: {}", e),
                Err(_) => {
                    warn!("Aborting fan-out task after {:?}", self.shutdown_grace);
                    handle.abort();
                    if let Err(e) = handle.await {
                        if !e.is_cancelled() {
                            warn!("Fan-out task failed: {}", e);
                        }
                    }
                }
            }
        }

        info!("Chat hub stopped");
    }
}
