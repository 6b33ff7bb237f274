use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::RoomStore;
use crate::error::{CodeshareError, Result};
use crate::room::Room;

const KEY_PREFIX: &str = "codeshare:room:";

/// Key/value cache room store. Each room document is stored as one
/// JSON string under `codeshare:room:{id}` and decoded through serde
/// only, so a value that is not a valid room document surfaces as
/// `CorruptDocument`.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CodeshareError::store(format!("redis url invalid: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CodeshareError::store(format!("redis connect failed: {}", e)))?;
        Ok(Self { conn })
    }

    fn key(room_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, room_id)
    }
}

#[async_trait]
impl RoomStore for RedisStore {
    async fn get(&self, room_id: &str) -> Result<Option<Room>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(room_id))
            .await
            .map_err(|e| CodeshareError::store(e.to_string()))?;

        match raw {
            Some(json) => {
                let room = serde_json::from_str(&json)
                    .map_err(|e| CodeshareError::CorruptDocument(e.to_string()))?;
                Ok(Some(room))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, room_id: &str, room: &Room) -> Result<()> {
        let json = serde_json::to_string(room)?;
        let mut conn = self.conn.clone();
        // A single SET is atomic on the server side: readers observe
        // either the previous document or the new one, never a blend.
        let _: () = conn
            .set(Self::key(room_id), json)
            .await
            .map_err(|e| CodeshareError::store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_namespaced() {
        assert_eq!(RedisStore::key("2"), "codeshare:room:2");
    }
}
