//! Axum router setup for the console server

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::{
    assets::static_handler,
    handlers::{get_module, get_topology, health_check, list_modules, search},
    websocket::ws_handler,
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // WebSocket endpoint for live topology updates
        .route("/ws", get(ws_handler))
        // REST API endpoints
        .route("/api/topology", get(get_topology))
        .route("/api/modules", get(list_modules))
        .route("/api/modules/:name", get(get_module))
        .route("/api/search", get(search))
        .route("/api/health", get(health_check))
        // Static console assets
        .route("/", get(static_handler))
        .route("/*path", get(static_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
