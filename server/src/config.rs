//! Fixed relay policy
//!
//! Everything here is a compile-time constant. Only the listening address
//! and the verifier URL can be chosen at startup; see `main.rs`.

use std::time::Duration;

/// Number of messages kept in the broadcast history.
pub const MAX_MESSAGES: usize = 4;

/// Longest accepted message after trimming, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 100;

pub const CONNECTION_BURST: u32 = 1;
pub const CONNECTION_REFILL: u32 = 1;
pub const CONNECTION_INTERVAL: Duration = Duration::from_secs(5);

pub const MESSAGE_BURST: u32 = 1;
pub const MESSAGE_REFILL: u32 = 1;
pub const MESSAGE_INTERVAL: Duration = Duration::from_secs(1);

/// Origins allowed to open a connection. `"null"` covers sandboxed and
/// non-browser clients.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "https://uploads.ungrounded.net",
    "https://slcount.netlify.app",
    "https://s-r.netlify.app",
    "https://serve.gamejolt.net",
    "null",
    "tw-editor://.",
    "http://serve.gamejolt.net",
    "https://www.newgrounds.com/portal/view/5561763",
    "https://www.newgrounds.com/projects/games/5561763/preview",
    "https://prod-dpgames.crazygames.com",
    "https://crazygames.com",
    "https://crazygames.com/game/skilled-royale",
    "https://html-classic.itch.zone",
    "https://turbowarp.org",
    "https://s-ri0p-delgae.netlify.app",
];

/// Lowercase substrings that cause a message body to be redacted.
pub const DENYLIST: &[&str] = &["badword"];

pub const FILTERED_PLACEHOLDER: &str = "Filtered message";

pub const VERIFY_URL: &str = "https://liquemgames-api.netlify.app/verify-token";

/// Origin presented to the verification service.
pub const VERIFY_ORIGIN: &str = "tw-editor://.";

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_PORT: u16 = 3000;

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    pub capacity: u32,
    pub refill: u32,
    pub interval: Duration,
}

/// Relay policy handed to the gateway at construction
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub max_messages: usize,
    pub max_message_length: usize,
    pub connection_limit: LimiterConfig,
    pub message_limit: LimiterConfig,
    pub allowed_origins: Vec<String>,
    pub denylist: Vec<String>,
    pub filtered_placeholder: String,
    pub verify_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_messages: MAX_MESSAGES,
            max_message_length: MAX_MESSAGE_LENGTH,
            connection_limit: LimiterConfig {
                capacity: CONNECTION_BURST,
                refill: CONNECTION_REFILL,
                interval: CONNECTION_INTERVAL,
            },
            message_limit: LimiterConfig {
                capacity: MESSAGE_BURST,
                refill: MESSAGE_REFILL,
                interval: MESSAGE_INTERVAL,
            },
            allowed_origins: ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            denylist: DENYLIST.iter().map(|w| w.to_string()).collect(),
            filtered_placeholder: FILTERED_PLACEHOLDER.to_string(),
            verify_timeout: VERIFY_TIMEOUT,
        }
    }
}

impl RelayConfig {
    pub fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) => self.allowed_origins.iter().any(|allowed| allowed == origin),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_constants() {
        let config = RelayConfig::default();
        assert_eq!(config.max_messages, 4);
        assert_eq!(config.max_message_length, 100);
        assert_eq!(config.connection_limit.interval, Duration::from_secs(5));
        assert_eq!(config.message_limit.interval, Duration::from_secs(1));
        assert_eq!(config.connection_limit.capacity, 1);
        assert_eq!(config.message_limit.capacity, 1);
    }

    #[test]
    fn test_origin_allow_list() {
        let config = RelayConfig::default();
        assert!(config.is_origin_allowed(Some("https://turbowarp.org")));
        assert!(config.is_origin_allowed(Some("null")));
        assert!(config.is_origin_allowed(Some("tw-editor://.")));
        assert!(!config.is_origin_allowed(Some("https://evil.example")));
        assert!(!config.is_origin_allowed(Some("https://turbowarp.org/")));
        assert!(!config.is_origin_allowed(None));
    }
}
