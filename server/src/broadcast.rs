//! Message admission and fan-out
//!
//! The broadcast engine owns the chat history and the global message rate
//! limiter. Every accepted message results in the complete history being
//! pushed to every connected player; clients never reconcile deltas.

use log::{debug, warn};
use shared::{ChatMessage, ServerMessage};
use tokio_tungstenite::tungstenite::Message;

use crate::config::RelayConfig;
use crate::history::ChatHistory;
use crate::presence::PresenceRegistry;
use crate::rate_limiter::TokenBucket;
use crate::utils::local_time_string;

/// What happened to a submitted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored and pushed to `delivered` connections; `failed` sends were skipped.
    Broadcast {
        sequence: u64,
        delivered: usize,
        failed: usize,
    },
    Empty,
    TooLong { length: usize },
    /// The room-wide message budget is exhausted.
    RateLimited,
}

pub struct BroadcastEngine {
    history: ChatHistory,
    limiter: TokenBucket,
    max_message_length: usize,
    denylist: Vec<String>,
    placeholder: String,
}

impl BroadcastEngine {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            history: ChatHistory::new(config.max_messages),
            limiter: TokenBucket::from_config(config.message_limit),
            max_message_length: config.max_message_length,
            denylist: config.denylist.iter().map(|w| w.to_lowercase()).collect(),
            placeholder: config.filtered_placeholder.clone(),
        }
    }

    /// Validates, rate-limits, filters and records a message, then fans the
    /// updated history out to everyone in `presence`
    ///
    /// Rejections are logged only; the sender is never told.
    pub fn submit(
        &mut self,
        player_id: &str,
        raw_text: &str,
        presence: &PresenceRegistry,
    ) -> SubmitOutcome {
        let text = raw_text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
        let length = text.chars().count();

        if length == 0 {
            warn!("Dropping empty message from {}", player_id);
            return SubmitOutcome::Empty;
        }
        if length > self.max_message_length {
            warn!(
                "Dropping {}-character message from {} (limit {})",
                length, player_id, self.max_message_length
            );
            return SubmitOutcome::TooLong { length };
        }

        if !self.limiter.try_consume(1) {
            warn!("Message rate limit exceeded, dropping message from {}", player_id);
            return SubmitOutcome::RateLimited;
        }

        let text = self.filter(text);
        let message = self.history.append(player_id, text, local_time_string());
        debug!("Message {} from {}: {}", message.sequence, player_id, message.text);

        let (delivered, failed) = match self.history_update() {
            Some(update) => fan_out(presence, update),
            None => (0, presence.len()),
        };

        SubmitOutcome::Broadcast {
            sequence: message.sequence,
            delivered,
            failed,
        }
    }

    /// The full history as an outbound frame
    pub fn history_update(&self) -> Option<Message> {
        let update = ServerMessage::Chat {
            messages: self.history.view(),
        };

        match update.to_json() {
            Ok(json) => Some(Message::text(json)),
            Err(e) => {
                warn!("Failed to serialize chat history: {}", e);
                None
            }
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.view()
    }

    /// Redacts the whole body when it contains a denylisted word
    fn filter(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        if self.denylist.iter().any(|word| lowered.contains(word.as_str())) {
            self.placeholder.clone()
        } else {
            text.to_string()
        }
    }
}

/// Sends `update` to every connected player
///
/// A closed channel only affects its own recipient.
fn fan_out(presence: &PresenceRegistry, update: Message) -> (usize, usize) {
    let mut delivered = 0;
    let mut failed = 0;

    for (player_id, sender) in presence.snapshot() {
        if sender.send(update.clone()).is_ok() {
            delivered += 1;
        } else {
            warn!("Failed to queue history update for {}", player_id);
            failed += 1;
        }
    }

    (delivered, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{OutboundRx, Player};
    use tokio::sync::mpsc;
    use tokio::time::{advance, Duration};

    fn join(presence: &mut PresenceRegistry, id: &str) -> OutboundRx {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = "127.0.0.1:9000".parse().unwrap();
        assert!(presence.admit(Player::new(id.to_string(), addr, tx)));
        rx
    }

    fn received_history(rx: &mut OutboundRx) -> Vec<ChatMessage> {
        match rx.try_recv().expect("expected a history update") {
            Message::Text(text) => match ServerMessage::parse(text.as_str()).unwrap() {
                ServerMessage::Chat { messages } => messages,
            },
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_message_reaches_everyone() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let mut rx1 = join(&mut presence, "p1");
        let mut rx2 = join(&mut presence, "p2");

        let outcome = engine.submit("p1", "  hello  ", &presence);
        assert_eq!(
            outcome,
            SubmitOutcome::Broadcast {
                sequence: 1,
                delivered: 2,
                failed: 0
            }
        );

        for rx in [&mut rx1, &mut rx2] {
            let history = received_history(rx);
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].sequence, 1);
            assert_eq!(history[0].player_id, "p1");
            assert_eq!(history[0].text, "hello");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_length_is_dropped_without_cost() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let mut rx = join(&mut presence, "p1");

        assert_eq!(engine.submit("p1", "   ", &presence), SubmitOutcome::Empty);
        assert_eq!(
            engine.submit("p1", &"x".repeat(101), &presence),
            SubmitOutcome::TooLong { length: 101 }
        );
        assert!(engine.history().is_empty());
        assert!(rx.try_recv().is_err());

        // The message token was never spent
        assert!(matches!(
            engine.submit("p1", &"x".repeat(100), &presence),
            SubmitOutcome::Broadcast { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_order_mark_counts_as_whitespace() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let mut rx = join(&mut presence, "p1");

        assert_eq!(
            engine.submit("p1", "\u{feff}", &presence),
            SubmitOutcome::Empty
        );
        assert!(rx.try_recv().is_err());

        engine.submit("p1", "\u{feff} hi \u{feff}", &presence);
        assert_eq!(received_history(&mut rx)[0].text, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_rate_limit_spans_senders() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let _rx1 = join(&mut presence, "p1");
        let _rx2 = join(&mut presence, "p2");

        assert!(matches!(
            engine.submit("p1", "first", &presence),
            SubmitOutcome::Broadcast { .. }
        ));
        assert_eq!(
            engine.submit("p2", "second", &presence),
            SubmitOutcome::RateLimited
        );
        assert_eq!(engine.history().len(), 1);

        advance(Duration::from_secs(1)).await;
        assert!(matches!(
            engine.submit("p2", "second", &presence),
            SubmitOutcome::Broadcast { sequence: 2, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_keeps_last_four() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let mut rx = join(&mut presence, "p1");

        for i in 1..=6 {
            engine.submit("p1", &format!("message {}", i), &presence);
            advance(Duration::from_secs(1)).await;
        }

        let mut last = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            last = match ServerMessage::parse(text.as_str()).unwrap() {
                ServerMessage::Chat { messages } => messages,
            };
        }

        let sequences: Vec<u64> = last.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5, 6]);
        assert_eq!(last[0].text, "message 3");
        assert_eq!(last[3].text, "message 6");
    }

    #[tokio::test(start_paused = true)]
    async fn test_denylisted_message_is_redacted() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let mut rx = join(&mut presence, "p1");

        engine.submit("p1", "you are a BadWord!", &presence);

        let history = received_history(&mut rx);
        assert_eq!(history[0].text, "Filtered message");
        assert_eq!(history[0].player_id, "p1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_checked_before_filtering() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let presence = PresenceRegistry::new();

        let long_bad = format!("badword{}", "x".repeat(100));
        assert_eq!(
            engine.submit("p1", &long_bad, &presence),
            SubmitOutcome::TooLong { length: 107 }
        );
        assert!(engine.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_recipient_does_not_abort_fan_out() {
        let mut engine = BroadcastEngine::new(&RelayConfig::default());
        let mut presence = PresenceRegistry::new();
        let rx_gone = join(&mut presence, "gone");
        let mut rx_live = join(&mut presence, "live");
        drop(rx_gone);

        let outcome = engine.submit("live", "still here", &presence);
        assert_eq!(
            outcome,
            SubmitOutcome::Broadcast {
                sequence: 1,
                delivered: 1,
                failed: 1
            }
        );
        assert_eq!(received_history(&mut rx_live)[0].text, "still here");
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let engine = BroadcastEngine::new(&RelayConfig::default());
        assert_eq!(engine.filter("BADWORDS everywhere"), "Filtered message");
        assert_eq!(engine.filter("xbadwordx"), "Filtered message");
        assert_eq!(engine.filter("perfectly fine"), "perfectly fine");
    }
}
