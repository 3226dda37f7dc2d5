//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::registry::random_player_id;
use crate::game::SessionEvent;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = random_player_id();
    info!(player_id = %player_id, "new WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Frames serialised by the game loop, drained into the socket
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel::<String>();

    let writer_id = player_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = sink_rx.recv().await {
            if ws_sink.send(Message::Text(frame)).await.is_err() {
                debug!(player_id = %writer_id, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Register the session; the game loop replies with INIT
    if state
        .game
        .events_tx
        .send(SessionEvent::Connected {
            player_id: player_id.clone(),
            sink: sink_tx,
        })
        .await
        .is_err()
    {
        error!(player_id = %player_id, "game loop unavailable, dropping connection");
        writer.abort();
        return;
    }
    state.connections.insert(player_id.clone(), unix_millis());

    let rate_limiter = SessionRateLimiter::new();

    // Reader loop: socket frames -> session events
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "rate limited inbound message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let event = SessionEvent::Message {
                            player_id: player_id.clone(),
                            msg,
                        };
                        if state.game.events_tx.send(event).await.is_err() {
                            debug!(player_id = %player_id, "event channel closed");
                            break;
                        }
                    }
                    // Malformed frames are logged and ignored; the
                    // connection stays open
                    Err(error) => {
                        warn!(player_id = %player_id, %error, "failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "client initiated close");
                break;
            }
            Err(error) => {
                error!(player_id = %player_id, %error, "WebSocket error");
                break;
            }
        }
    }

    // Run the disconnect path in the game loop
    let _ = state
        .game
        .events_tx
        .send(SessionEvent::Disconnected {
            player_id: player_id.clone(),
        })
        .await;
    state.connections.remove(&player_id);
    writer.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}
