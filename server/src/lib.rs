//! # Chat Server Library
//!
//! This library provides the broadcast core of the chat service. Every
//! message a client sends is delivered to every connected client, the
//! sender included.
//!
//! ## Core Responsibilities
//!
//! ### Connection Management
//! The registry holds the set of connections eligible for delivery. Handlers
//! insert their connection when it opens and remove it when it closes; the
//! fan-out loop removes connections whose writes fail. Removal is idempotent.
//!
//! ### Fan-out
//! A single task drains the broadcast channel and writes each message to a
//! snapshot of the registry. Writes run concurrently and are each bounded by
//! a timeout, so one stuck client cannot stall delivery to the others. All
//! writes for one message finish before the next message is taken, which
//! keeps per-connection order equal to enqueue order.
//!
//! ### Failure Isolation
//! Transport errors and malformed payloads only ever close the connection
//! they happened on. Nothing a client does stops the fan-out loop.
//!
//! ## Module Organization
//!
//! - `registry`: concurrent set of live connections
//! - `channel`: the broadcast queue, bounded or unbounded
//! - `connection`: one connection's writer, lifecycle state and close signal
//! - `fanout`: the delivery loop
//! - `handler`: per-connection read loop
//! - `hub`: owns the above and supervises the tasks
//! - `network` / `ws`: TCP accept loop and WebSocket adapter
//! - `memory`: in-process transport for embedding and tests
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::bind(ServerConfig::default()).await?;
//!
//!     let shutdown = server.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod hub;
pub mod memory;
pub mod network;
pub mod registry;
pub mod ws;

pub use error::{ChatError, Result};
