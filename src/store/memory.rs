use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::RoomStore;
use crate::error::Result;
use crate::room::Room;

/// Process-memory room store. Room state does not survive restart;
/// the Coordinator must not care.
///
/// An explicit repository object rather than an ambient global so it
/// can be injected and reset in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Drops every room. Test hook; lifecycle is otherwise process
    /// start to process stop.
    pub async fn reset(&self) {
        self.rooms.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn get(&self, room_id: &str) -> Result<Option<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).cloned())
    }

    async fn upsert(&self, room_id: &str, room: &Room) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room_id.to_string(), room.clone());
        Ok(())
    }
}
