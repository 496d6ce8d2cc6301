//! Per-connection admission and message dispatch
//!
//! Every incoming connection walks the same path:
//!
//! ```text
//! Connecting -> OriginChecked -> AdmissionPending -> Active -> Closed
//!      \______________\________________\
//!                                       -> Rejected(reason)
//! ```
//!
//! - the declared origin must be on the allow-list,
//! - the connection limiter must have a token,
//! - the identity service must vouch for the token in the request path,
//! - the resolved player must not already be present.
//!
//! The gateway owns the process-wide relay state (presence, broadcast engine,
//! connection limiter) behind one lock. Each step that touches it runs to
//! completion without awaiting anything else, so an identity check plus
//! insert can never interleave with another connection's.

use log::{debug, info, warn};
use shared::{ChatMessage, ClientMessage, CloseReason};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::broadcast::{BroadcastEngine, SubmitOutcome};
use crate::config::RelayConfig;
use crate::presence::{OutboundTx, Player, PresenceRegistry};
use crate::rate_limiter::TokenBucket;
use crate::verifier::{IdentityVerifier, PlayerId, VerifyError};

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    OriginChecked,
    AdmissionPending,
    Active,
    Closed,
    Rejected(CloseReason),
}

/// What the upgrade request told us about the client
#[derive(Debug, Clone)]
pub struct Handshake {
    pub origin: Option<String>,
    pub path: String,
    pub addr: SocketAddr,
    /// Proxy-aware client address for logs
    pub client_ip: String,
}

impl Handshake {
    /// The opaque token is the request path minus its leading slash.
    pub fn token(&self) -> &str {
        self.path.strip_prefix('/').unwrap_or(&self.path)
    }
}

/// One client connection as seen by the gateway
#[derive(Debug)]
pub struct Connection {
    handshake: Handshake,
    phase: ConnectionPhase,
    player_id: Option<PlayerId>,
}

impl Connection {
    pub fn new(handshake: Handshake) -> Self {
        Self {
            handshake,
            phase: ConnectionPhase::Connecting,
            player_id: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }
}

struct RelayState {
    presence: PresenceRegistry,
    engine: BroadcastEngine,
    connection_limiter: TokenBucket,
}

/// Shared entry point for every connection task
#[derive(Clone)]
pub struct Gateway {
    state: Arc<Mutex<RelayState>>,
    verifier: Arc<dyn IdentityVerifier>,
    config: Arc<RelayConfig>,
}

impl Gateway {
    pub fn new(config: RelayConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let state = RelayState {
            presence: PresenceRegistry::new(),
            engine: BroadcastEngine::new(&config),
            connection_limiter: TokenBucket::from_config(config.connection_limit),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            verifier,
            config: Arc::new(config),
        }
    }

    /// Runs the admission checks for `conn`
    ///
    /// On success the player is registered, the current history has been
    /// queued on `sender`, and the connection is Active. On failure the
    /// connection is Rejected and the caller should close the transport with
    /// the returned reason.
    pub async fn admit(
        &self,
        conn: &mut Connection,
        sender: OutboundTx,
    ) -> Result<PlayerId, CloseReason> {
        match self.run_admission(conn, sender).await {
            Ok(player_id) => {
                conn.player_id = Some(player_id.clone());
                conn.phase = ConnectionPhase::Active;
                Ok(player_id)
            }
            Err(reason) => {
                warn!("Rejected {}: {}", conn.handshake.client_ip, reason);
                conn.phase = ConnectionPhase::Rejected(reason);
                Err(reason)
            }
        }
    }

    async fn run_admission(
        &self,
        conn: &mut Connection,
        sender: OutboundTx,
    ) -> Result<PlayerId, CloseReason> {
        if !self.config.is_origin_allowed(conn.handshake.origin.as_deref()) {
            debug!("Origin {:?} not allowed", conn.handshake.origin);
            return Err(CloseReason::UnauthorizedOrigin);
        }
        conn.phase = ConnectionPhase::OriginChecked;

        {
            let mut state = self.state.lock().await;
            if !state.connection_limiter.try_consume(1) {
                info!("Connection rate-limited: {}", conn.handshake.client_ip);
                return Err(CloseReason::RateLimited);
            }
        }
        conn.phase = ConnectionPhase::AdmissionPending;

        let player_id = self.verify(conn.handshake.token()).await?;

        let mut state = self.state.lock().await;
        let player = Player::new(player_id.clone(), conn.handshake.addr, sender.clone());
        if !state.presence.admit(player) {
            return Err(CloseReason::DuplicatePlayer);
        }

        if let Some(update) = state.engine.history_update() {
            if sender.send(update).is_err() {
                debug!("Connection for {} closed before initial history", player_id);
            }
        }

        Ok(player_id)
    }

    async fn verify(&self, token: &str) -> Result<PlayerId, CloseReason> {
        let result = match timeout(self.config.verify_timeout, self.verifier.verify(token)).await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::Timeout),
        };

        match result {
            Ok(player_id) if !player_id.is_empty() => Ok(player_id),
            Ok(_) | Err(VerifyError::Denied) => Err(CloseReason::InvalidToken),
            Err(e) => {
                warn!("Error verifying token: {}", e);
                Err(CloseReason::VerificationError)
            }
        }
    }

    /// Handles one inbound text frame from an Active connection
    ///
    /// Frames that are not a well-formed chat message are dropped. Returns
    /// the broadcast outcome when the frame reached the engine.
    pub async fn handle_text(&self, conn: &Connection, raw: &str) -> Option<SubmitOutcome> {
        let player_id = match (conn.phase, conn.player_id.as_deref()) {
            (ConnectionPhase::Active, Some(player_id)) => player_id,
            _ => return None,
        };

        let message = match ClientMessage::parse(raw) {
            Ok(ClientMessage::Chat { message }) => message,
            Err(e) => {
                debug!("Ignoring frame from {}: {}", player_id, e);
                return None;
            }
        };

        let mut state = self.state.lock().await;
        let RelayState { presence, engine, .. } = &mut *state;
        Some(engine.submit(player_id, &message, presence))
    }

    /// Marks the connection Closed and deregisters its player
    ///
    /// Only a connection that reached Active owns a registry entry, so a
    /// rejected duplicate can never evict the player it collided with.
    pub async fn disconnect(&self, conn: &mut Connection) -> bool {
        let removed = match (conn.phase, conn.player_id.as_deref()) {
            (ConnectionPhase::Active, Some(player_id)) => {
                let mut state = self.state.lock().await;
                state.presence.remove(player_id)
            }
            _ => false,
        };

        if conn.phase == ConnectionPhase::Active {
            conn.phase = ConnectionPhase::Closed;
        }
        removed
    }

    pub async fn player_count(&self) -> usize {
        self.state.lock().await.presence.len()
    }

    pub async fn is_present(&self, player_id: &str) -> bool {
        self.state.lock().await.presence.contains(player_id)
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.engine.history()
    }
}
