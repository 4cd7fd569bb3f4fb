use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;
use warp::ws::{Message, WebSocket};

use crate::sync::{decode_client_event, RoomServer, ServerEvent};

/// Drive one WebSocket connection: register the session, hand the client
/// its identity, then pump events both ways until the peer goes away.
pub async fn handle_websocket(
    websocket: WebSocket,
    server: Arc<RoomServer>,
    ping_interval: Duration,
    liveness_timeout: Duration,
) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (session_id, mut outbox) = server.register_session().await;

    tracing::info!(session_id = %session_id, "WebSocket connection established");

    server
        .send_to(
            &session_id,
            ServerEvent::Connected {
                session_id: session_id.clone(),
            },
        )
        .await;

    // Outbox pump: serialize queued events onto the wire in emission
    // order, interleaving pings so half-open peers get noticed.
    let sender_task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + ping_interval;
        let mut ping_timer = tokio::time::interval_at(start, ping_interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = outbox.recv() => {
                    let Some(event) = event else { break };
                    match event.to_text() {
                        Ok(text) => {
                            if ws_sender.send(Message::text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize event");
                        }
                    }
                }
                _ = ping_timer.tick() => {
                    if ws_sender.send(Message::ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        // Any inbound frame counts as liveness; a silent peer beyond the
        // timeout is treated as a dead connection.
        match tokio::time::timeout(liveness_timeout, ws_receiver.next()).await {
            Ok(Some(Ok(message))) => {
                if message.is_close() {
                    break;
                }
                let Ok(text) = message.to_str() else {
                    continue; // ping/pong/binary
                };

                match decode_client_event(text) {
                    Ok(event) => server.handle_event(&session_id, event).await,
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            raw_message = %text,
                            "Rejected malformed client event"
                        );
                        server
                            .send_to(
                                &session_id,
                                ServerEvent::Error {
                                    message: e.to_string(),
                                },
                            )
                            .await;
                    }
                }
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(
                    session_id = %session_id,
                    "No frames within liveness timeout, dropping connection"
                );
                break;
            }
        }
    }

    server.handle_disconnect(&session_id).await;
    sender_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket connection closed");
}
