//! WebSocket transport plumbing for live sessions.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::hub::ConnectionHub;
use crate::api::AppState;

/// Query parameters for the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    user: Option<String>,
}

/// WebSocket upgrade handler.
///
/// GET /ws?user=<username>
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(username) = query.user.filter(|u| !u.is_empty()) else {
        warn!("upgrade request without a user name");
        return StatusCode::BAD_REQUEST.into_response();
    };

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| take_connection(hub, username, socket))
}

/// Adopt a freshly upgraded socket for `username`.
///
/// Resolves the user first; an unknown username is logged and the socket
/// dropped without ever becoming a session.
pub async fn take_connection(hub: Arc<ConnectionHub>, username: String, socket: WebSocket) {
    let user = match hub.resolve_user(&username).await {
        Ok(user) => user,
        Err(err) => {
            warn!(%username, %err, "refusing connection for unknown user");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(ConnectionHub::outbound_buffer());
    let session = hub.register(user, outbound_tx).await;

    // Writer task: the only writer on this socket. Everything outbound,
    // replies and broadcasts alike, arrives through the session queue.
    let writer_session = session.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_session.closed() => break,
                event = outbound_rx.recv() => {
                    let Some(event) = event else { break };
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(username = %writer_session.username(), %err, "failed to serialize event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        // Superseded or shut down: actively close the socket so the peer
        // notices instead of idling on a half-dead connection.
        let _ = sink.close().await;
    });

    // Read loop for this session.
    loop {
        tokio::select! {
            _ = session.closed() => {
                info!(username = %session.username(), "session closed, stopping read loop");
                break;
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_message(&session, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(username = %session.username(), "peer closed connection");
                        break;
                    }
                    Some(Ok(other)) => {
                        debug!(username = %session.username(), ?other, "skipping non-text message");
                    }
                    Some(Err(err)) => {
                        warn!(username = %session.username(), %err, "read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    hub.deregister(&session).await;
    session.close();
    let _ = writer.await;
}
