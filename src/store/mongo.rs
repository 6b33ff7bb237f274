use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Client, Collection};

use super::RoomStore;
use crate::error::{CodeshareError, Result};
use crate::room::Room;

const COLLECTION: &str = "rooms";

/// Document-database room store. One document per room in a single
/// collection, keyed by the `room` field.
pub struct MongoStore {
    rooms: Collection<Room>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| CodeshareError::store(format!("mongodb connect failed: {}", e)))?;
        let rooms = client.database(database).collection::<Room>(COLLECTION);
        Ok(Self { rooms })
    }

    fn map_err(err: mongodb::error::Error) -> CodeshareError {
        match *err.kind {
            mongodb::error::ErrorKind::BsonDeserialization(ref e) => {
                CodeshareError::CorruptDocument(e.to_string())
            }
            _ => CodeshareError::store(err.to_string()),
        }
    }
}

#[async_trait]
impl RoomStore for MongoStore {
    async fn get(&self, room_id: &str) -> Result<Option<Room>> {
        self.rooms
            .find_one(doc! { "room": room_id }, None)
            .await
            .map_err(Self::map_err)
    }

    async fn upsert(&self, room_id: &str, room: &Room) -> Result<()> {
        // replace_one with upsert gives the full-document replace the
        // Coordinator relies on: no partial writes.
        let options = ReplaceOptions::builder().upsert(true).build();
        self.rooms
            .replace_one(doc! { "room": room_id }, room, options)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
