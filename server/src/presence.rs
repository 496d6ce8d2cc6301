//! Presence tracking for admitted players
//!
//! This module holds the live set of identified connections:
//! - One entry per player identifier, never two
//! - Each entry owns the outbound channel of its connection
//! - Entries are added on admission and removed when the connection closes
//!
//! The registry is the only place that knows who is connected; the broadcast
//! engine reads a snapshot of it to fan updates out.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::verifier::PlayerId;

/// Channel feeding a connection's writer task
pub type OutboundTx = mpsc::UnboundedSender<Message>;
pub type OutboundRx = mpsc::UnboundedReceiver<Message>;

/// An admitted, identified connection
#[derive(Debug)]
pub struct Player {
    /// Identifier issued by the identity service
    pub id: PlayerId,
    /// Client address used for logging
    pub addr: SocketAddr,
    /// When the player was admitted
    pub connected_at: Instant,
    /// Outbound queue of the player's connection
    pub sender: OutboundTx,
}

impl Player {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: OutboundTx) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// How long the player has been connected
    pub fn session_length(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Registry of connected players keyed by identifier
///
/// Uniqueness is enforced by [`PresenceRegistry::admit`]: a second player
/// with an identifier already present is refused rather than replacing the
/// first one.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    players: HashMap<PlayerId, Player>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the player unless its identifier is already present
    ///
    /// Returns false without touching the registry on a duplicate.
    pub fn admit(&mut self, player: Player) -> bool {
        if self.players.contains_key(&player.id) {
            return false;
        }

        info!("Player {} joined from {}", player.id, player.addr);
        self.players.insert(player.id.clone(), player);
        true
    }

    /// Removes a player, returning whether it was present
    pub fn remove(&mut self, player_id: &str) -> bool {
        if let Some(player) = self.players.remove(player_id) {
            info!(
                "Player {} left after {:.1}s",
                player.id,
                player.session_length().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Identifiers and outbound channels of every connected player
    pub fn snapshot(&self) -> Vec<(PlayerId, OutboundTx)> {
        self.players
            .values()
            .map(|player| (player.id.clone(), player.sender.clone()))
            .collect()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    /// Returns the number of connected players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
