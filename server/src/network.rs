//! Server network layer: TCP accept loop and WebSocket upgrade

use crate::config::ServerConfig;
use crate::error::Result;
use crate::hub::ChatHub;
use crate::ws;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Bound on the HTTP upgrade handshake for one client
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts WebSocket clients and attaches them to the chat hub
pub struct ChatServer {
    listener: TcpListener,
    hub: ChatHub,
    config: ServerConfig,
}

impl ChatServer {
    /// Binds the listener and starts the hub's fan-out loop
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!(
            "Server listening on {} (chat path {})",
            listener.local_addr()?,
            config.ws_path
        );

        let hub = ChatHub::start(&config);
        Ok(Self {
            listener,
            hub,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &ChatHub {
        &self.hub
    }

    /// Token that stops `run` when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.hub.shutdown_token()
    }

    /// Accepts connections until shutdown, then stops the hub
    pub async fn run(self) -> Result<()> {
        let shutdown = self.hub.shutdown_token();
        info!("Server started successfully");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_upgrade(stream, addr),
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }
            }
        }

        self.hub.shutdown().await;
        Ok(())
    }

    fn spawn_upgrade(&self, stream: TcpStream, addr: SocketAddr) {
        let hub = self.hub.clone();
        let path = self.config.ws_path.clone();

        self.hub.spawn_tracked(async move {
            let upgrade = tokio::time::timeout(HANDSHAKE_TIMEOUT, ws::accept(stream, &path)).await;
            let socket = match upgrade {
                Ok(Ok(socket)) => socket,
                Ok(Err(e)) => {
                    debug!("Upgrade from {} refused: {}", addr, e);
                    return;
                }
                Err(_) => {
                    warn!("Upgrade from {} timed out", addr);
                    return;
                }
            };

            let (sink, frames) = ws::split(socket);
            hub.handler(sink, frames, Some(addr)).run().await;
        });
    }
}
