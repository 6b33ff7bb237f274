use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use warp::ws::Message;

use crate::error::Result;
use crate::room::signaling::ServerMessage;

/// Identifier of one WebSocket connection. User ids are only unique
/// within a room, so subscriptions are keyed by connection instead.
pub type ConnectionId = u64;

/// Room-scoped broadcast registry: every subscribed connection's
/// outbound channel, grouped by room. All emissions for a room are
/// issued by this single process over per-connection FIFO channels,
/// which is what gives broadcasts their per-room delivery order.
#[derive(Debug, Default)]
pub struct BroadcastGateway {
    rooms: RwLock<HashMap<String, HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a connection to a room's broadcast scope.
    pub async fn subscribe(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id, sender);
        tracing::debug!(room_id = %room_id, connection_id, "Connection subscribed to room");
    }

    /// Removes a connection from a room's broadcast scope, dropping
    /// the room entry once nobody is subscribed.
    pub async fn unsubscribe(&self, room_id: &str, connection_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(subscribers) = rooms.get_mut(room_id) {
            subscribers.remove(&connection_id);
            if subscribers.is_empty() {
                rooms.remove(room_id);
            }
        }
        tracing::debug!(room_id = %room_id, connection_id, "Connection unsubscribed from room");
    }

    /// Delivers a message to every connection subscribed to the room,
    /// sender included. Connections whose channel has closed are
    /// skipped; the socket task tears them down on its own.
    pub async fn broadcast(&self, room_id: &str, message: &ServerMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        let rooms = self.rooms.read().await;
        if let Some(subscribers) = rooms.get(room_id) {
            for (connection_id, sender) in subscribers {
                if sender.send(Message::text(text.clone())).is_err() {
                    tracing::debug!(
                        room_id = %room_id,
                        connection_id,
                        "Skipping broadcast to closed connection"
                    );
                }
            }
        }
        Ok(())
    }

    /// Private reply to one connection over its own channel.
    pub fn send_to(
        sender: &mpsc::UnboundedSender<Message>,
        message: &ServerMessage,
    ) -> Result<()> {
        let text = serde_json::to_string(message)?;
        if sender.send(Message::text(text)).is_err() {
            tracing::debug!("Private reply dropped: connection already closed");
        }
        Ok(())
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|s| s.len()).unwrap_or(0)
    }
}
