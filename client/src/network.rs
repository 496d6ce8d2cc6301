use crate::display::{describe_close, format_history};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ChatMessage, ClientMessage, ServerMessage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Something the relay told us
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    History(Vec<ChatMessage>),
    Closed { code: u16, reason: String },
}

/// Decodes a relay frame, ignoring anything that is not part of the protocol
pub fn interpret(frame: Message) -> Option<RelayEvent> {
    match frame {
        Message::Text(text) => match ServerMessage::parse(text.as_str()) {
            Ok(ServerMessage::Chat { messages }) => Some(RelayEvent::History(messages)),
            Err(e) => {
                debug!("Ignoring unexpected frame: {}", e);
                None
            }
        },
        Message::Close(Some(frame)) => Some(RelayEvent::Closed {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_string(),
        }),
        Message::Close(None) => Some(RelayEvent::Closed {
            code: 1005,
            reason: String::new(),
        }),
        _ => None,
    }
}

pub struct ChatClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChatClient {
    /// Opens `{server}/{token}` presenting `origin`
    pub async fn connect(
        server: &str,
        token: &str,
        origin: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let url = format!("{}/{}", server.trim_end_matches('/'), token);
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_str(origin)?);

        let (ws, _response) = connect_async(request).await?;
        info!("Connected to {}", server);

        Ok(ChatClient { ws })
    }

    /// Prints history updates and forwards stdin lines until either side closes
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let (mut sink, mut source) = self.ws.split();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                frame = source.next() => {
                    match frame {
                        Some(Ok(frame)) => match interpret(frame) {
                            Some(RelayEvent::History(messages)) => {
                                println!("{}\n", format_history(&messages));
                            }
                            Some(RelayEvent::Closed { code, reason }) => {
                                println!("{}", describe_close(code, &reason));
                                break;
                            }
                            None => {}
                        },
                        Some(Err(e)) => {
                            warn!("Connection error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) if !line.trim().is_empty() => {
                            let json = ClientMessage::chat(line).to_json()?;
                            sink.send(Message::text(json)).await?;
                        }
                        Some(_) => {}
                        None => {
                            sink.close().await?;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn test_interpret_history() {
        let frame = Message::text(
            r#"{"type":"chat","messages":[{"id":1,"timestamp":"1:00:00 PM","playerId":"p1","message":"hello"}]}"#,
        );
        match interpret(frame) {
            Some(RelayEvent::History(messages)) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].player_id, "p1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_interpret_close_frame() {
        let frame = Message::Close(Some(CloseFrame {
            code: CloseCode::from(4003),
            reason: "Duplicate player ID".into(),
        }));
        assert_eq!(
            interpret(frame),
            Some(RelayEvent::Closed {
                code: 4003,
                reason: "Duplicate player ID".to_string()
            })
        );
    }

    #[test]
    fn test_interpret_ignores_noise() {
        assert_eq!(interpret(Message::text("not json")), None);
        assert_eq!(interpret(Message::Ping(Default::default())), None);
    }
}
