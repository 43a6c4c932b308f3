//! # Chat Client Library
//!
//! Terminal client for the broadcast chat server. It connects to the
//! server's WebSocket endpoint, sends every line typed on stdin as a chat
//! message and prints every broadcast it receives, including its own.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Turns typed lines into `ChatMessage` values and formats received ones.
//!
//! ### Network Module (`network`)
//! Owns the WebSocket connection and the interactive send/receive loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8080/api/ws", "alice").await?;
//!     client.send_line("hello everyone").await?;
//!
//!     if let Some(message) = client.next_message().await {
//!         println!("{:?}", message?);
//!     }
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
