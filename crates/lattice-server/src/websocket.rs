//! WebSocket handling for live topology updates

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use lattice_core::Layout;

use crate::ServerState;

/// WebSocket message types for client-server communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client asks for the full topology again
    RequestTopology,
    /// Server sends the full topology
    Topology { layout: Layout },
    /// Client subscribes to updates
    Subscribe,
    /// Client unsubscribes from updates
    Unsubscribe,
    /// Ping/pong for keepalive
    Ping,
    Pong,
    /// Error message
    Error { message: String },
}

/// Serialize the current layout as a `topology` frame.
async fn topology_frame(state: &ServerState) -> Option<String> {
    let layout = state.layout.read().await.clone();
    match serde_json::to_string(&WsMessage::Topology { layout }) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("failed to serialize topology frame: {e}");
            None
        }
    }
}

/// Handle WebSocket upgrade requests
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("new WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.update_tx.subscribe();

    // The current topology goes out immediately so new clients render
    // without waiting for the next refresh.
    if let Some(frame) = topology_frame(&state).await {
        if sender.send(Message::Text(frame)).await.is_err() {
            warn!("failed to send initial topology");
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(frame) => {
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_message(&text, &state).await {
                        if sender.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {e}");
                    break;
                }
            },
        }
    }

    info!("WebSocket connection closed");
}

/// Handle one client frame, returning an optional reply frame.
async fn handle_client_message(text: &str, state: &ServerState) -> Option<String> {
    let message = match serde_json::from_str::<WsMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("unparseable WebSocket message: {e}");
            return None;
        }
    };

    match message {
        WsMessage::RequestTopology => topology_frame(state).await,
        WsMessage::Ping => serde_json::to_string(&WsMessage::Pong).ok(),
        WsMessage::Subscribe => {
            debug!("client subscribed to updates");
            None
        }
        WsMessage::Unsubscribe => {
            debug!("client unsubscribed from updates");
            None
        }
        other => {
            debug!("ignoring client message: {other:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_messages_serialize_with_type_tags() {
        let json = serde_json::to_string(&WsMessage::Ping).unwrap();
        assert!(json.contains("ping"));

        let json = serde_json::to_string(&WsMessage::Topology {
            layout: Layout::default(),
        })
        .unwrap();
        assert!(json.contains("topology"));
        assert!(json.contains("nodes"));
    }

    #[tokio::test]
    async fn ping_gets_a_pong() {
        let state = ServerState::new();
        let reply = handle_client_message(r#"{"type":"ping"}"#, &state).await;
        assert_eq!(reply.unwrap(), r#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn topology_requests_return_the_current_layout() {
        let state = ServerState::new();
        let reply = handle_client_message(r#"{"type":"request_topology"}"#, &state)
            .await
            .unwrap();
        let parsed: WsMessage = serde_json::from_str(&reply).unwrap();
        assert!(matches!(parsed, WsMessage::Topology { .. }));
    }

    #[tokio::test]
    async fn garbage_frames_are_ignored() {
        let state = ServerState::new();
        assert!(handle_client_message("garbage", &state).await.is_none());
    }
}
