use std::sync::Arc;
use std::time::Duration;

use warp::http::StatusCode;
use warp::Filter;

use crate::catalog::{CodeBlockDetail, CodeBlockStore};
use crate::sync::RoomServer;

use super::websocket;

/// WebSocket route: the primary streaming substrate
pub fn ws_route(
    server: Arc<RoomServer>,
    ping_interval: Duration,
    liveness_timeout: Duration,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_server(server))
        .map(move |ws: warp::ws::Ws, server: Arc<RoomServer>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_websocket(websocket, server, ping_interval, liveness_timeout)
            })
        })
}

/// Read-only catalog resource consumed by the lobby and at room
/// initialization: a listing and a per-block detail lookup.
pub fn catalog_routes(
    store: Arc<CodeBlockStore>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let listing = warp::path("api")
        .and(warp::path("codeblocks"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_store(store.clone()))
        .map(|store: Arc<CodeBlockStore>| warp::reply::json(&store.list()));

    let detail = warp::path("api")
        .and(warp::path("codeblocks"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_store(store))
        .map(|id: String, store: Arc<CodeBlockStore>| match store.get(&id) {
            Some(block) => warp::reply::with_status(
                warp::reply::json(&CodeBlockDetail::from(block)),
                StatusCode::OK,
            ),
            None => warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": "Block not found" })),
                StatusCode::NOT_FOUND,
            ),
        });

    listing.or(detail)
}

pub fn health_route() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "CodeShare Server",
                "version": "1.0.0"
            }))
        })
}

fn with_server(
    server: Arc<RoomServer>,
) -> impl Filter<Extract = (Arc<RoomServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}

fn with_store(
    store: Arc<CodeBlockStore>,
) -> impl Filter<Extract = (Arc<CodeBlockStore>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || store.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_store() -> Arc<CodeBlockStore> {
        Arc::new(CodeBlockStore::from_config(None).unwrap())
    }

    #[tokio::test]
    async fn test_health_reply() {
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&health_route())
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_catalog_listing() {
        let resp = warp::test::request()
            .method("GET")
            .path("/api/codeblocks")
            .reply(&catalog_routes(seed_store()))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        let blocks = body.as_array().unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].get("id").is_some());
        assert!(blocks[0].get("title").is_some());
        // listing carries no code or solution
        assert!(blocks[0].get("code").is_none());
    }

    #[tokio::test]
    async fn test_catalog_detail() {
        let resp = warp::test::request()
            .method("GET")
            .path("/api/codeblocks/array-methods")
            .reply(&catalog_routes(seed_store()))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["id"], "array-methods");
        assert!(body["code"].as_str().unwrap().contains("numbers"));
        assert!(body.get("solution").is_none());
    }

    #[tokio::test]
    async fn test_catalog_detail_not_found() {
        let resp = warp::test::request()
            .method("GET")
            .path("/api/codeblocks/missing")
            .reply(&catalog_routes(seed_store()))
            .await;
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "Block not found");
    }
}
