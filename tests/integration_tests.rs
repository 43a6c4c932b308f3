//! Integration tests for the chat server and client
//!
//! These tests run the real WebSocket server on an ephemeral port and talk to
//! it with real clients.

use client::network::Client;
use futures::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::hub::ChatHub;
use server::network::ChatServer;
use shared::ChatMessage;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: SocketAddr,
    hub: ChatHub,
    handle: JoinHandle<server::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            write_timeout: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(1),
            ..ServerConfig::default()
        };

        let server = ChatServer::bind(config).await.expect("Failed to bind server");
        let addr = server.local_addr().unwrap();
        let hub = server.hub().clone();
        let handle = tokio::spawn(server.run());

        TestServer { addr, hub, handle }
    }

    fn url(&self) -> String {
        format!("ws://{}{}", self.addr, shared::CHAT_PATH)
    }

    async fn wait_for_connections(&self, count: usize) {
        for _ in 0..200 {
            if self.hub.registry().len().await == count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} connections, registry has {}",
            count,
            self.hub.registry().len().await
        );
    }

    async fn stop(self) {
        self.hub.shutdown_token().cancel();
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

async fn recv(client: &mut Client) -> ChatMessage {
    timeout(RECV_TIMEOUT, client.next_message())
        .await
        .expect("timed out waiting for a message")
        .expect("connection closed")
        .expect("connection error")
}

async fn assert_silent(client: &mut Client) {
    let extra = timeout(Duration::from_millis(150), client.next_message()).await;
    assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);
}

/// BROADCAST TESTS
mod broadcast_tests {
    use super::*;

    /// Three clients, one message: everyone gets exactly one copy, the sender included
    #[tokio::test]
    async fn every_client_receives_one_copy() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        let mut bob = Client::connect(&server.url(), "bob").await.unwrap();
        let mut carol = Client::connect(&server.url(), "carol").await.unwrap();
        server.wait_for_connections(3).await;

        alice.send_line("hi").await.unwrap();

        let expected = ChatMessage::new("alice", "hi");
        for client in [&mut alice, &mut bob, &mut carol] {
            assert_eq!(recv(client).await, expected);
        }
        for client in [&mut alice, &mut bob, &mut carol] {
            assert_silent(client).await;
        }

        server.stop().await;
    }

    /// Messages from one sender arrive in the order they were sent
    #[tokio::test]
    async fn messages_arrive_in_send_order() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        let mut bob = Client::connect(&server.url(), "bob").await.unwrap();
        server.wait_for_connections(2).await;

        for i in 0..25 {
            alice.send_line(&format!("message {}", i)).await.unwrap();
        }

        for client in [&mut bob, &mut alice] {
            for i in 0..25 {
                assert_eq!(recv(client).await.message, format!("message {}", i));
            }
        }

        server.stop().await;
    }

    /// Binary frames holding JSON are accepted and re-broadcast as text
    #[tokio::test]
    async fn binary_frames_are_accepted() {
        let server = TestServer::start().await;
        let (mut raw, _) = connect_async(server.url()).await.unwrap();
        let mut bob = Client::connect(&server.url(), "bob").await.unwrap();
        server.wait_for_connections(2).await;

        raw.send(Message::binary(
            br#"{"username":"raw","message":"bytes"}"#.to_vec(),
        ))
        .await
        .unwrap();

        assert_eq!(recv(&mut bob).await, ChatMessage::new("raw", "bytes"));
        server.stop().await;
    }
}

/// FAILURE ISOLATION TESTS
mod failure_tests {
    use super::*;

    /// A client whose transport dies is dropped; the others keep chatting
    #[tokio::test]
    async fn broken_client_is_removed() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        let (broken, _) = connect_async(server.url()).await.unwrap();
        server.wait_for_connections(2).await;

        drop(broken);

        alice.send_line("first").await.unwrap();
        assert_eq!(recv(&mut alice).await.message, "first");
        server.wait_for_connections(1).await;

        alice.send_line("second").await.unwrap();
        assert_eq!(recv(&mut alice).await.message, "second");

        server.stop().await;
    }

    /// A malformed payload closes only the offending connection
    #[tokio::test]
    async fn malformed_payload_closes_sender_only() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        let (mut raw, _) = connect_async(server.url()).await.unwrap();
        server.wait_for_connections(2).await;

        raw.send(Message::text("this is not json")).await.unwrap();

        let closed = timeout(RECV_TIMEOUT, async {
            while let Some(frame) = raw.next().await {
                match frame {
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "server never closed the malformed connection");
        server.wait_for_connections(1).await;

        alice.send_line("still here").await.unwrap();
        assert_eq!(recv(&mut alice).await.message, "still here");

        server.stop().await;
    }

    /// Upgrades on any path other than the chat path are refused
    #[tokio::test]
    async fn wrong_path_is_refused() {
        let server = TestServer::start().await;

        let result = connect_async(format!("ws://{}/not-chat", server.addr)).await;
        assert!(result.is_err());
        assert!(server.hub.registry().is_empty().await);

        server.stop().await;
    }
}

/// LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// A client that leaves cleanly is unregistered
    #[tokio::test]
    async fn clean_disconnect_unregisters() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        server.wait_for_connections(1).await;

        alice.close().await;

        server.wait_for_connections(0).await;
        server.stop().await;
    }

    /// Shutdown disconnects clients instead of leaving them hanging
    #[tokio::test]
    async fn shutdown_disconnects_clients() {
        let server = TestServer::start().await;
        let mut alice = Client::connect(&server.url(), "alice").await.unwrap();
        server.wait_for_connections(1).await;

        server.stop().await;

        let ended = timeout(RECV_TIMEOUT, alice.next_message()).await;
        match ended {
            Ok(None) | Ok(Some(Err(_))) => {}
            other => panic!("expected the connection to end, got {:?}", other),
        }
    }
}
