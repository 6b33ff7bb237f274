use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::room::{ClientMessage, ConnectionBinding, RoomServer};

/// Drives one WebSocket connection: inbound client messages are
/// dispatched to the room server, outbound emissions are funneled
/// through an unbounded channel so broadcasts never block a handler.
pub async fn handle_room_websocket(websocket: WebSocket, room_server: Arc<RoomServer>) {
    let connection_id: u64 = rand::random();
    tracing::info!(connection_id, "New room WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let mut binding: Option<ConnectionBinding> = None;

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                handle_websocket_message(&room_server, connection_id, &tx, message, &mut binding)
                    .await;
            }
            Err(e) => {
                tracing::error!(connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    room_server.handle_disconnect(connection_id, binding).await;
    sender_task.abort();
    tracing::info!(connection_id, "Room WebSocket connection closed");
}

async fn handle_websocket_message(
    room_server: &Arc<RoomServer>,
    connection_id: u64,
    tx: &mpsc::UnboundedSender<Message>,
    message: Message,
    binding: &mut Option<ConnectionBinding>,
) {
    if let Ok(text) = message.to_str() {
        tracing::debug!(connection_id, "Received client message: {}", text);

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(client_message) => {
                room_server
                    .handle_message(connection_id, tx, client_message, binding)
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    connection_id,
                    error = %e,
                    raw_message = %text,
                    "Failed to parse client message"
                );
            }
        }
    }
}
