use serde::{Deserialize, Serialize};

use crate::room::model::Role;

/// Messages a client may send over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room: String,
        user_id: String,
    },

    UpdateCode {
        room: String,
        user_id: String,
        code: String,
    },

    Leave {
        room: String,
        user_id: String,
    },
}

/// Messages the server emits, privately or room-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Private reply to a join.
    Joined { role: Role, code: String },

    /// Private reply to a joining Mentor: `(display name, code)` pairs
    /// for every ordered Student. A sequence rather than a map so join
    /// order survives serialization past nine Students.
    MentorView { students: Vec<(String, String)> },

    /// Room-wide broadcast after a code update, sender included.
    CodeUpdated {
        user_id: String,
        student_name: String,
        code: String,
    },

    /// Room-wide broadcast after a leave, emitted unconditionally.
    Left { user_id: String },

    /// Private reply to the requester whose operation failed.
    Error { message: String },
}
