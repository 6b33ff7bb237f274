mod api;
mod catalog;
mod config;
mod error;
mod room;
mod store;

use std::sync::Arc;
use warp::Filter;

use catalog::TemplateCatalog;
use config::Config;
use room::RoomServer;

#[tokio::main]
async fn main() -> error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codeshare_server=info,warp=info")),
        )
        .init();

    let config = Config::from_env();

    let catalog = Arc::new(TemplateCatalog::new());
    let store = store::build_store(&config.store).await?;
    let room_server = Arc::new(RoomServer::new(
        store,
        catalog.clone(),
        config.throttle.build(),
    ));

    let routes = api::room_routes::room_websocket_route(room_server)
        .or(api::room_routes::exercises_route(catalog))
        .or(api::room_routes::health_check())
        .or(api::room_routes::config_endpoint());

    let addr = config.bind_address();
    tracing::info!(host = %config.server.host, port = config.server.port, "Starting codeshare server");

    warp::serve(routes).run(addr).await;
    Ok(())
}
