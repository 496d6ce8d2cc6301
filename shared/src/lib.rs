use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type tag used by both directions of the chat protocol.
pub const CHAT_TYPE: &str = "chat";

/// Messages sent by clients to the relay
///
/// Only `chat` is recognised. Anything else fails to deserialize and is
/// dropped by the server without closing the connection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Chat { message: String },
}

/// Messages sent by the relay to clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The complete current history, oldest first.
    Chat { messages: Vec<ChatMessage> },
}

/// A single entry of the broadcast history
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(rename = "id")]
    pub sequence: u64,
    pub timestamp: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "message")]
    pub text: String,
}

impl ClientMessage {
    pub fn chat(message: impl Into<String>) -> Self {
        ClientMessage::Chat {
            message: message.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Reasons the relay closes a connection during admission
///
/// Each variant carries a distinct application close code in the 4000 range
/// so clients can tell rejections apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    VerificationError,
    InvalidToken,
    RateLimited,
    DuplicatePlayer,
    UnauthorizedOrigin,
}

impl CloseReason {
    pub const ALL: [CloseReason; 5] = [
        CloseReason::VerificationError,
        CloseReason::InvalidToken,
        CloseReason::RateLimited,
        CloseReason::DuplicatePlayer,
        CloseReason::UnauthorizedOrigin,
    ];

    pub fn code(self) -> u16 {
        match self {
            CloseReason::VerificationError => 4000,
            CloseReason::InvalidToken => 4001,
            CloseReason::RateLimited => 4002,
            CloseReason::DuplicatePlayer => 4003,
            CloseReason::UnauthorizedOrigin => 4004,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            CloseReason::VerificationError => "Token verification error",
            CloseReason::InvalidToken => "Invalid token",
            CloseReason::RateLimited => {
                "Connection rate-limited. Too many connections in a short period."
            }
            CloseReason::DuplicatePlayer => "Duplicate player ID",
            CloseReason::UnauthorizedOrigin => "Unauthorized origin",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.code() == code)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.code())
    }
}
