pub mod room_routes;
pub mod room_websocket;
