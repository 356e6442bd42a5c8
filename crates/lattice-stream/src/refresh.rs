//! Topology rebuild on each registry publication

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

use lattice_core::{
    build_call_graph, layout::layout, Layout, ModuleDetailSource, ModuleIndex, ModuleSchema,
    SchemaRegistry,
};

use crate::client::cancelled;

/// Subscribes to schema snapshot publications and re-derives everything
/// downstream of them: module index, call graph, and layout. Each pass
/// recomputes from scratch and broadcasts the fresh layout to connected
/// clients.
pub struct RefreshService {
    registry: Arc<RwLock<SchemaRegistry>>,
    index: Arc<ModuleIndex>,
    details: Arc<dyn ModuleDetailSource>,
    layout: Arc<RwLock<Layout>>,
    update_tx: broadcast::Sender<String>,
    cancel: watch::Receiver<bool>,
}

impl RefreshService {
    pub fn new(
        registry: Arc<RwLock<SchemaRegistry>>,
        index: Arc<ModuleIndex>,
        details: Arc<dyn ModuleDetailSource>,
        layout: Arc<RwLock<Layout>>,
        update_tx: broadcast::Sender<String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        RefreshService {
            registry,
            index,
            details,
            layout,
            update_tx,
            cancel,
        }
    }

    /// Run until cancelled, refreshing once per publication.
    pub async fn run(mut self) -> Result<()> {
        let mut rx = self.registry.read().await.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            self.refresh(&snapshot).await;

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                _ = cancelled(&mut self.cancel) => {
                    info!("topology refresh cancelled");
                    return Ok(());
                }
            }
        }
    }

    /// One full rebuild: fetch detail, rebuild the index, derive the call
    /// graph and layout, store and broadcast the result. Detail failures
    /// degrade to empty detail rather than blocking reconciliation.
    pub async fn refresh(&self, snapshot: &[ModuleSchema]) {
        let names: Vec<String> = snapshot.iter().map(|s| s.name.clone()).collect();
        let details = match self.details.fetch_details(&names).await {
            Ok(details) => details,
            Err(e) => {
                warn!("module detail fetch failed: {e}");
                HashMap::new()
            }
        };

        self.index.rebuild(snapshot, &details);
        let modules = self.index.all();
        let graph = build_call_graph(&modules);

        let cycles = graph.cycles();
        if !cycles.is_empty() {
            debug!(?cycles, "call cycles in module graph");
        }

        let fresh = layout(&modules, &graph);
        debug!(
            nodes = fresh.nodes.len(),
            edges = fresh.edges.len(),
            "topology refreshed"
        );
        *self.layout.write().await = fresh.clone();

        match serde_json::to_string(&fresh) {
            Ok(json) => {
                let message = format!(r#"{{"type":"topology","layout":{json}}}"#);
                // No receivers just means no clients are connected.
                let _ = self.update_tx.send(message);
            }
            Err(e) => error!("failed to serialize layout: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Cancellation;
    use lattice_core::{ChangeEvent, ChangeType, ModuleSchema, NullDetailSource};

    fn added(name: &str, more: bool) -> ChangeEvent {
        ChangeEvent {
            module_name: name.to_string(),
            change_type: ChangeType::Added,
            schema: Some(ModuleSchema {
                name: name.to_string(),
                comments: Vec::new(),
                decls: Vec::new(),
            }),
            more,
        }
    }

    #[tokio::test]
    async fn refresh_rebuilds_index_layout_and_broadcasts() {
        let registry = Arc::new(RwLock::new(SchemaRegistry::new()));
        let index = Arc::new(ModuleIndex::new());
        let layout_state = Arc::new(RwLock::new(Layout::default()));
        let (update_tx, mut update_rx) = broadcast::channel(16);
        let cancellation = Cancellation::new();

        let service = RefreshService::new(
            Arc::clone(&registry),
            Arc::clone(&index),
            Arc::new(NullDetailSource),
            Arc::clone(&layout_state),
            update_tx,
            cancellation.token(),
        );

        {
            let mut registry = registry.write().await;
            registry.apply(added("auth", true));
            registry.apply(added("billing", false));
        }

        let snapshot = registry.read().await.snapshot();
        service.refresh(&snapshot).await;

        assert_eq!(index.len(), 2);
        assert_eq!(layout_state.read().await.nodes.len(), 2);

        let message = update_rx.try_recv().unwrap();
        assert!(message.contains(r#""type":"topology""#));
        assert!(message.contains(r#""id":"auth""#));
    }
}
