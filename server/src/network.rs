//! Server network layer handling WebSocket connections

use crate::config::RelayConfig;
use crate::gateway::{Connection, Gateway, Handshake};
use crate::utils::client_ip;
use crate::verifier::IdentityVerifier;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::CloseReason;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

/// How long a rejected client gets to acknowledge the close frame
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Listening relay server
pub struct Server {
    listener: TcpListener,
    gateway: Gateway,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: RelayConfig,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            gateway: Gateway::new(config, verifier),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the shared relay state, mainly for inspection
    pub fn gateway(&self) -> Gateway {
        self.gateway.clone()
    }

    /// Accepts connections until the listener fails
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Server started successfully");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer, gateway).await;
            });
        }
    }
}

fn handshake_from_request(req: &Request, peer: SocketAddr) -> Handshake {
    let origin = req
        .headers()
        .get("origin")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    Handshake {
        origin,
        path: req.uri().path().to_string(),
        addr: peer,
        client_ip: client_ip(req.headers(), peer),
    }
}

/// Drives one connection from upgrade to close
async fn handle_connection(stream: TcpStream, peer: SocketAddr, gateway: Gateway) {
    let mut handshake = None;
    let ws_stream = match tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            handshake = Some(handshake_from_request(req, peer));
            Ok(response)
        },
    )
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            debug!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let Some(handshake) = handshake else {
        return;
    };

    let mut conn = Connection::new(handshake);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();

    let player_id = match gateway.admit(&mut conn, out_tx).await {
        Ok(player_id) => player_id,
        Err(reason) => {
            reject(ws_stream, reason).await;
            return;
        }
    };
    info!("Joined global chat: {}", player_id);

    let (mut sink, mut source) = ws_stream.split();

    // The writer ends once the registry drops this player's sender
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!("Write to client failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                gateway.handle_text(&conn, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary frame from {}", player_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Connection error for {}: {}", player_id, e);
                break;
            }
        }
    }

    gateway.disconnect(&mut conn).await;
    info!("Player disconnected: {}", player_id);

    if let Err(e) = writer.await {
        error!("Writer task for {} panicked: {}", player_id, e);
    }
}

pub(crate) fn close_frame(reason: CloseReason) -> CloseFrame {
    CloseFrame {
        code: CloseCode::from(reason.code()),
        reason: Utf8Bytes::from_static(reason.reason()),
    }
}

/// Closes an upgraded connection that failed admission
async fn reject(mut ws_stream: WebSocketStream<TcpStream>, reason: CloseReason) {
    if let Err(e) = ws_stream.close(Some(close_frame(reason))).await {
        debug!("Failed to send close frame: {}", e);
        return;
    }

    // Wait briefly for the client's close acknowledgement
    let drain = async { while let Some(Ok(_)) = ws_stream.next().await {} };
    let _ = tokio::time::timeout(CLOSE_GRACE, drain).await;
}
