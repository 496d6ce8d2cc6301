//! Bounded chat history
//!
//! Keeps the most recent messages in arrival order. Sequence numbers are
//! handed out here and keep counting across evictions.

use shared::ChatMessage;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
    next_sequence: u64,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_sequence: 1,
        }
    }

    /// Records a message under the next sequence number
    ///
    /// The oldest entries are evicted once the history is over capacity.
    pub fn append(&mut self, player_id: &str, text: String, timestamp: String) -> ChatMessage {
        let message = ChatMessage {
            sequence: self.next_sequence,
            timestamp,
            player_id: player_id.to_string(),
            text,
        };
        self.next_sequence += 1;

        self.messages.push_back(message.clone());
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }

        message
    }

    /// Current contents, oldest first
    pub fn view(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
