use std::sync::Arc;

use crate::catalog::TemplateCatalog;
use crate::error::Result;
use crate::room::model::{Role, Room};
use crate::store::RoomStore;

/// Private reply to a joining connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReply {
    pub role: Role,
    pub code: String,
    /// `"Student {n}" -> code` pairs in join order. Present only when
    /// the joiner is the Mentor and the room has ordered Students.
    pub student_view: Option<Vec<(String, String)>>,
}

/// Room-wide broadcast payload produced by a code update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBroadcast {
    pub user_id: String,
    pub student_name: String,
    pub code: String,
}

/// The coordination core: role assignment, Student ordering and the
/// join/update/leave transitions. Reads and writes through the store;
/// holds no room state of its own beyond what is in flight for a
/// single call.
pub struct RoomCoordinator {
    store: Arc<dyn RoomStore>,
    catalog: Arc<TemplateCatalog>,
}

impl RoomCoordinator {
    pub fn new(store: Arc<dyn RoomStore>, catalog: Arc<TemplateCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Join transition. First joiner while the mentor slot is unset
    /// claims it; everyone else becomes an ordered Student. Student
    /// code is seeded from the catalog only when the stored code is
    /// empty, so rejoining returns the stored code rather than the
    /// template.
    pub async fn join(&self, room_id: &str, user_id: &str) -> Result<JoinReply> {
        let mut room = self
            .store
            .get(room_id)
            .await?
            .unwrap_or_else(|| Room::empty(room_id));

        room.add_participant(user_id);
        let role = room.role_of(user_id);

        if role == Role::Student {
            let needs_seed = room
                .students
                .get(user_id)
                .map(|code| code.is_empty())
                .unwrap_or(true);
            if needs_seed {
                let seed = self.catalog.seed_code(room_id);
                room.students.insert(user_id.to_string(), seed);
            }
        }

        self.store.upsert(room_id, &room).await?;

        let code = room.students.get(user_id).cloned().unwrap_or_default();
        let student_view = match role {
            Role::Mentor if !room.order.is_empty() => Some(room.student_snapshot()),
            _ => None,
        };

        tracing::info!(room_id = %room_id, user_id = %user_id, ?role, "Participant joined room");
        Ok(JoinReply {
            role,
            code,
            student_view,
        })
    }

    /// Update transition: last-write-wins overwrite of the user's own
    /// slot. Updates for unknown rooms or users are stale by policy
    /// and dropped silently: `Ok(None)`, no store mutation.
    pub async fn update_code(
        &self,
        room_id: &str,
        user_id: &str,
        code: String,
    ) -> Result<Option<UpdateBroadcast>> {
        let mut room = match self.store.get(room_id).await? {
            Some(room) => room,
            None => {
                tracing::debug!(room_id = %room_id, user_id = %user_id, "Dropping update for unknown room");
                return Ok(None);
            }
        };

        if !room.is_participant(user_id) {
            tracing::debug!(room_id = %room_id, user_id = %user_id, "Dropping update from unknown participant");
            return Ok(None);
        }

        room.students.insert(user_id.to_string(), code.clone());
        self.store.upsert(room_id, &room).await?;

        Ok(Some(UpdateBroadcast {
            user_id: user_id.to_string(),
            student_name: room.display_name(user_id),
            code,
        }))
    }

    /// Leave transition. Removes the user from `students` and `order`;
    /// the mentor slot is deliberately not reassigned. Persists even
    /// when the room becomes empty. Returns whether the user was
    /// actually found (the "left" notification is emitted either way
    /// by the caller).
    pub async fn leave(&self, room_id: &str, user_id: &str) -> Result<bool> {
        let mut room = match self.store.get(room_id).await? {
            Some(room) => room,
            None => return Ok(false),
        };

        let was_present = room.remove_participant(user_id);
        if was_present {
            self.store.upsert(room_id, &room).await?;
            tracing::info!(room_id = %room_id, user_id = %user_id, "Participant left room");
        }
        Ok(was_present)
    }
}
