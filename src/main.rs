mod api;
mod catalog;
mod config;
mod error;
mod sync;

use std::sync::Arc;

use warp::Filter;

use config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let store = match catalog::CodeBlockStore::from_config(config.catalog.path.as_deref()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load catalog");
            std::process::exit(1);
        }
    };

    let server = Arc::new(sync::RoomServer::new(store.clone()));

    let gateway = Arc::new(api::polling::PollGateway::new(
        server.clone(),
        config.transport.poll_wait,
        config.transport.liveness_timeout,
    ));
    gateway.clone().spawn_reaper();

    let routes = api::routes::ws_route(
        server,
        config.transport.ping_interval,
        config.transport.liveness_timeout,
    )
    .or(api::routes::catalog_routes(store))
    .or(api::routes::health_route())
    .or(api::polling::poll_routes(gateway));

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting codeshare server"
    );

    warp::serve(routes).run(config.bind_address()).await;
}
