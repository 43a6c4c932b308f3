//! Connection registry for the chat server
//!
//! This module tracks which connections are eligible for fan-out delivery:
//! - Registration of new connections, bounded by a capacity limit
//! - Idempotent removal from any task (handler or fan-out loop)
//! - Point-in-time snapshots for delivery that never hold the lock across I/O
//!
//! Removal retires the connection while the write lock is held, so a
//! snapshot taken before the removal can no longer write to it afterwards.

use crate::connection::{Connection, ConnectionId};
use crate::error::{ChatError, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The authoritative set of connections eligible for fan-out
///
/// Shared between connection handlers and the fan-out loop as an
/// `Arc<Registry>`. All methods take `&self`.
pub struct Registry {
    /// Live connections indexed by their ID
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Next ID handed out by `next_id`
    next_id: AtomicU64,
    /// Maximum number of concurrent connections
    max_connections: usize,
}

impl Registry {
    /// Creates an empty registry; IDs start from 1
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_connections,
        }
    }

    /// Allocates a fresh connection ID
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a connection and marks it active
    ///
    /// Fails with `RegistryFull` at capacity, or `Closed` if the connection
    /// was closed before it could be registered.
    pub async fn add(&self, connection: Arc<Connection>) -> Result<()> {
        let mut connections = self.connections.write().await;

        if connections.len() >= self.max_connections {
            return Err(ChatError::RegistryFull(self.max_connections));
        }
        if !connection.activate() {
            return Err(ChatError::Closed);
        }

        let id = connection.id();
        match connection.peer() {
            Some(addr) => info!("{} connected from {}", id, addr),
            None => info!("{} connected", id),
        }
        connections.insert(id, connection);
        debug!("{} connections registered", connections.len());
        Ok(())
    }

    /// Deregisters a connection
    ///
    /// Returns true if the connection was present. Removing an absent ID is a
    /// no-op, so the handler and the fan-out loop may both call this.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        match connections.remove(&id) {
            Some(connection) => {
                connection.retire();
                info!("{} disconnected", id);
                true
            }
            None => false,
        }
    }

    /// Returns the current membership for delivery
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Returns the number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
