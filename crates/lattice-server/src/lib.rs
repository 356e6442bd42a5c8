//! HTTP + WebSocket console server

pub mod assets;
pub mod handlers;
pub mod router;
pub mod websocket;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use lattice_core::{Layout, ModuleIndex, SchemaRegistry};

/// Capacity of the outbound update channel; slow clients that fall further
/// behind than this see a lag notice and skip ahead.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Shared state behind every handler: the registry, the derived module
/// index, the latest layout, and the broadcast channel carrying serialized
/// update frames to WebSocket clients.
pub struct ServerState {
    pub registry: Arc<RwLock<SchemaRegistry>>,
    pub index: Arc<ModuleIndex>,
    pub layout: Arc<RwLock<Layout>>,
    pub update_tx: broadcast::Sender<String>,
}

impl ServerState {
    pub fn new() -> Self {
        let (update_tx, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        ServerState {
            registry: Arc::new(RwLock::new(SchemaRegistry::new())),
            index: Arc::new(ModuleIndex::new()),
            layout: Arc::new(RwLock::new(Layout::default())),
            update_tx,
        }
    }

    /// Broadcast a serialized frame to connected WebSocket clients. Returns
    /// how many clients received it; zero when none are connected.
    pub fn broadcast(&self, message: String) -> usize {
        self.update_tx.send(message).unwrap_or(0)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The console server: binds, serves the router, and shuts down on ctrl-c.
pub struct TopologyServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl TopologyServer {
    pub fn new(config: ServerConfig) -> Self {
        TopologyServer {
            state: Arc::new(ServerState::new()),
            config,
        }
    }

    /// Shared state handle for wiring up the stream services.
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Serve until ctrl-c.
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("console listening on http://{addr}");

        let app = router::create_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_without_clients_reaches_nobody() {
        let state = ServerState::new();
        assert_eq!(state.broadcast("frame".to_string()), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let state = ServerState::new();
        let mut rx = state.update_tx.subscribe();
        assert_eq!(state.broadcast("frame".to_string()), 1);
        assert_eq!(rx.recv().await.unwrap(), "frame");
    }
}
