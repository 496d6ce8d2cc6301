use shared::{ChatMessage, CloseReason};

/// Renders a full history update, one message per line
pub fn format_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".to_string();
    }

    messages
        .iter()
        .map(|m| format!("#{} [{}] {}: {}", m.sequence, m.timestamp, m.player_id, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Describes why the relay closed the connection
pub fn describe_close(code: u16, reason: &str) -> String {
    match CloseReason::from_code(code) {
        Some(known) => format!("Rejected by relay: {}", known),
        None if reason.is_empty() => format!("Connection closed ({})", code),
        None => format!("Connection closed: {} ({})", reason, code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_history() {
        assert_eq!(format_history(&[]), "(no messages yet)");
    }

    #[test]
    fn test_format_history_lines() {
        let messages = vec![
            ChatMessage {
                sequence: 1,
                timestamp: "1:00:00 PM".to_string(),
                player_id: "p1".to_string(),
                text: "hello".to_string(),
            },
            ChatMessage {
                sequence: 2,
                timestamp: "1:00:02 PM".to_string(),
                player_id: "p2".to_string(),
                text: "hi".to_string(),
            },
        ];

        assert_eq!(
            format_history(&messages),
            "#1 [1:00:00 PM] p1: hello\n#2 [1:00:02 PM] p2: hi"
        );
    }

    #[test]
    fn test_describe_known_close() {
        assert_eq!(
            describe_close(4003, "Duplicate player ID"),
            "Rejected by relay: Duplicate player ID (4003)"
        );
    }

    #[test]
    fn test_describe_unknown_close() {
        assert_eq!(describe_close(1000, ""), "Connection closed (1000)");
        assert_eq!(describe_close(1001, "bye"), "Connection closed: bye (1001)");
    }
}
