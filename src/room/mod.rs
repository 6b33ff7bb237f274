mod coordinator;
mod gateway;
mod model;
mod server;
mod signaling;
mod throttle;

pub use coordinator::{JoinReply, RoomCoordinator, UpdateBroadcast};
pub use gateway::{BroadcastGateway, ConnectionId};
pub use model::{Role, Room};
pub use server::{ConnectionBinding, RoomServer, EVENT_JOIN, EVENT_LEAVE, EVENT_UPDATE_CODE};
pub use signaling::{ClientMessage, ServerMessage};
pub use throttle::Throttle;
