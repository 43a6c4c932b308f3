//! Runtime configuration for the chat server

use std::time::Duration;

/// Capacity of the broadcast channel between connection handlers and the
/// fan-out loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCapacity {
    /// Producers never wait on enqueue
    Unbounded,
    /// Producers wait once this many messages are queued
    Bounded(usize),
}

impl ChannelCapacity {
    /// Maps a CLI value to a capacity; absent or zero means unbounded
    pub fn from_option(value: Option<usize>) -> Self {
        match value {
            Some(0) | None => ChannelCapacity::Unbounded,
            Some(n) => ChannelCapacity::Bounded(n),
        }
    }
}

/// Settings shared by the hub and the WebSocket listener
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request path that is upgraded to a chat connection
    pub ws_path: String,
    /// Upper bound on a single delivery to one connection
    pub write_timeout: Duration,
    pub channel_capacity: ChannelCapacity,
    pub max_connections: usize,
    /// How long shutdown waits for handlers and the fan-out task
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: shared::DEFAULT_PORT,
            ws_path: shared::CHAT_PATH.to_string(),
            write_timeout: Duration::from_secs(5),
            channel_capacity: ChannelCapacity::Unbounded,
            max_connections: 1024,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.ws_path, "/api/ws");
        assert_eq!(config.channel_capacity, ChannelCapacity::Unbounded);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_channel_capacity_from_option() {
        assert_eq!(ChannelCapacity::from_option(None), ChannelCapacity::Unbounded);
        assert_eq!(ChannelCapacity::from_option(Some(0)), ChannelCapacity::Unbounded);
        assert_eq!(
            ChannelCapacity::from_option(Some(64)),
            ChannelCapacity::Bounded(64)
        );
    }
}
