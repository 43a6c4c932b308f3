//! Fan-out loop delivering every broadcast message to every registered connection

use crate::channel::BroadcastReceiver;
use crate::connection::Connection;
use crate::registry::Registry;
use futures::future::join_all;
use log::{debug, error, info, warn};
use shared::ChatMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of delivering one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct FanoutLoop {
    registry: Arc<Registry>,
    receiver: BroadcastReceiver,
    write_timeout: Duration,
    shutdown: CancellationToken,
}

impl FanoutLoop {
    pub fn new(
        registry: Arc<Registry>,
        receiver: BroadcastReceiver,
        write_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            receiver,
            write_timeout,
            shutdown,
        }
    }

    /// Drains the broadcast channel until shutdown or until every producer is gone
    pub async fn run(mut self) {
        info!("Fan-out loop started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Fan-out loop shutting down");
                    break;
                }
                message = self.receiver.recv() => message,
            };

            match message {
                Some(message) => {
                    self.deliver(&message).await;
                }
                None => {
                    info!("Broadcast channel closed, fan-out loop exiting");
                    break;
                }
            }
        }

        self.receiver.close();
    }

    /// Sends one message to the current registry membership
    ///
    /// Writes go out concurrently, each bounded by the write timeout, and all
    /// of them finish before the next message is taken off the channel. Any
    /// connection that fails is removed and closed; the rest are unaffected.
    /// Shutdown abandons writes still in flight.
    pub async fn deliver(&self, message: &ChatMessage) -> DeliveryReport {
        let frame = match shared::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode message from {}: {}", message.username, e);
                return DeliveryReport::default();
            }
        };

        let recipients = self.registry.snapshot().await;
        if recipients.is_empty() {
            return DeliveryReport::default();
        }

        let writes = join_all(
            recipients
                .iter()
                .map(|conn| conn.send(frame.clone(), self.write_timeout)),
        );
        let results = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("Delivery from {} abandoned on shutdown", message.username);
                return DeliveryReport::default();
            }
            results = writes => results,
        };

        let mut report = DeliveryReport::default();
        let mut failed: Vec<&Arc<Connection>> = Vec::new();
        for (conn, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to deliver to {}: {}", conn.id(), e);
                    report.dropped += 1;
                    failed.push(conn);
                }
            }
        }

        for conn in &failed {
            self.registry.remove(conn.id()).await;
        }
        let closes = join_all(
            failed
                .iter()
                .map(|conn| conn.close_within(self.write_timeout)),
        );
        // Handlers close their own connections on shutdown
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            _ = closes => {}
        }

        debug!(
            "Delivered message from {} to {} connections ({} dropped)",
            message.username, report.delivered, report.dropped
        );
        report
    }
}
