use std::sync::Arc;
use warp::Filter;

use super::room_websocket;
use crate::catalog::TemplateCatalog;
use crate::room::RoomServer;

/// Creates the room WebSocket route.
pub fn room_websocket_route(
    room_server: Arc<RoomServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_room_server(room_server))
        .map(|ws: warp::ws::Ws, room_server: Arc<RoomServer>| {
            ws.on_upgrade(move |websocket| {
                room_websocket::handle_room_websocket(websocket, room_server)
            })
        })
}

/// Read-only exercise listing backing the lobby.
pub fn exercises_route(
    catalog: Arc<TemplateCatalog>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("exercises")
        .and(warp::get())
        .and(warp::any().map(move || catalog.clone()))
        .map(|catalog: Arc<TemplateCatalog>| warp::reply::json(&catalog.listing()))
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Codeshare Server",
                "version": "1.0.0"
            }))
        })
}

pub fn config_endpoint() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
{
    warp::path("config")
        .and(warp::get())
        .map(|| {
            use std::env;

            let config = serde_json::json!({
                "WEBSOCKET_URL": env::var("WEBSOCKET_URL").ok(),
                "LOBBY_UI_URL": env::var("LOBBY_UI_URL").ok(),
                "EDITOR_UI_URL": env::var("EDITOR_UI_URL").ok()
            });

            warp::reply::json(&config)
        })
}

fn with_room_server(
    room_server: Arc<RoomServer>,
) -> impl Filter<Extract = (Arc<RoomServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || room_server.clone())
}
