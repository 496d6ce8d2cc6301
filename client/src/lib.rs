//! # Chat Client Library
//!
//! A small terminal client for the chat relay. It connects with a player
//! token, prints the room's history every time the relay pushes it, and
//! sends each line typed on stdin as a chat message.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! WebSocket connection setup, the read/write loop and decoding of relay
//! frames into [`network::RelayEvent`]s.
//!
//! ### Display Module (`display`)
//! Formatting of history updates and close reasons for the terminal.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::ChatClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::connect("ws://127.0.0.1:3000", "my-token", "null").await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod network;
