//! # Chat Relay Server Library
//!
//! This library implements a real-time broadcast relay. Clients connect over
//! WebSocket, prove who they are through an external identity service, and
//! exchange short text messages that every connected participant receives.
//!
//! ## Core Responsibilities
//!
//! ### Admission Control
//! Every connection passes through the gateway before it may chat:
//! - The declared `Origin` must be on a fixed allow-list
//! - Connection attempts are throttled by a token bucket
//! - The token in the request path is verified with the identity service
//! - A player identifier may only be connected once at a time
//!
//! Each failed check closes the connection with its own close code.
//!
//! ### Broadcasting
//! Accepted chat messages are validated, rate-limited by a single room-wide
//! token bucket, filtered against a denylist and recorded in a short history.
//! The complete history is then pushed to every connected player, so clients
//! never need to reconcile partial updates.
//!
//! ### Presence
//! The presence registry maps player identifiers to live connections. It is
//! written only on admission and on disconnect.
//!
//! ## Module Organization
//!
//! ### Gateway (`gateway`)
//! The per-connection state machine and the owner of all shared relay state.
//!
//! ### Broadcast Engine (`broadcast`)
//! Message validation, rate limiting, filtering and fan-out.
//!
//! ### History (`history`), Presence (`presence`), Rate Limiter (`rate_limiter`)
//! The building blocks the gateway and engine are made of.
//!
//! ### Verifier (`verifier`)
//! The identity service seam and its HTTP implementation.
//!
//! ### Network (`network`)
//! WebSocket listener and per-connection I/O tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::{RelayConfig, VERIFY_URL};
//! use server::network::Server;
//! use server::verifier::HttpVerifier;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let verifier = Arc::new(HttpVerifier::new(VERIFY_URL));
//!     let server = Server::new("0.0.0.0:3000", RelayConfig::default(), verifier).await?;
//!
//!     // Accepts connections forever; each one gets its own task
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! All shared state lives behind a single lock owned by the gateway. Work
//! done under the lock never awaits, so the only point where two
//! connections can interleave is the identity check itself. Registry
//! insertion re-checks uniqueness under the lock, which makes concurrent
//! logins with the same identity resolve to exactly one winner.

pub mod broadcast;
pub mod config;
pub mod gateway;
pub mod history;
pub mod network;
pub mod presence;
pub mod rate_limiter;
pub mod verifier;

mod utils;
