mod cache;
mod memory;
mod mongo;

pub use cache::RedisStore;
pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{CodeshareError, Result};
use crate::room::Room;

/// Uniform interface over a room's persisted state. Backends treat the
/// room document as opaque: they store and return it byte-for-byte
/// equivalent and never partially apply a write.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Fetches the room document, `None` when the room id is unseen.
    async fn get(&self, room_id: &str) -> Result<Option<Room>>;

    /// Full replace of the room document keyed by `room_id`, creating
    /// it when absent.
    async fn upsert(&self, room_id: &str, room: &Room) -> Result<()>;
}

/// Builds the store backend named by deployment configuration.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn RoomStore>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::info!("Using in-memory room store");
            Ok(Arc::new(MemoryStore::new()))
        }
        "mongo" => {
            let store =
                MongoStore::connect(&config.mongo_url, &config.mongo_database).await?;
            tracing::info!(database = %config.mongo_database, "Using MongoDB room store");
            Ok(Arc::new(store))
        }
        "cache" => {
            let store = RedisStore::connect(&config.redis_url).await?;
            tracing::info!("Using Redis room store");
            Ok(Arc::new(store))
        }
        other => Err(CodeshareError::InvalidConfiguration(format!(
            "unknown store backend '{}' (expected memory, mongo or cache)",
            other
        ))),
    }
}
