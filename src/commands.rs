//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use lattice_core::{
    build_call_graph, layout, ChangeEvent, Module, ModuleDetail, ModuleDetailSource,
    NullDetailSource, SchemaRegistry,
};
use lattice_server::{ServerConfig, TopologyServer};
use lattice_stream::{Cancellation, HttpDetailSource, RefreshService, StreamService};

pub async fn serve(
    host: String,
    port: u16,
    upstream: String,
    details_url: Option<String>,
    open: bool,
) -> anyhow::Result<()> {
    tracing::info!("starting console server on {host}:{port}");
    tracing::info!("schema stream upstream: {upstream}");

    let config = ServerConfig {
        host: host.clone(),
        port,
    };
    let server = TopologyServer::new(config);
    let state = server.state();

    let cancellation = Cancellation::new();

    let details: Arc<dyn ModuleDetailSource> = match details_url {
        Some(url) => {
            tracing::info!("module detail API: {url}");
            Arc::new(HttpDetailSource::new(url))
        }
        None => Arc::new(NullDetailSource),
    };

    // Stream consumption and topology refresh run alongside the server.
    let stream = StreamService::new(
        upstream,
        Arc::clone(&state.registry),
        cancellation.token(),
    );
    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            tracing::error!("schema stream terminated: {e:#}");
        }
    });

    let refresh = RefreshService::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.index),
        details,
        Arc::clone(&state.layout),
        state.update_tx.clone(),
        cancellation.token(),
    );
    tokio::spawn(async move {
        if let Err(e) = refresh.run().await {
            tracing::error!("topology refresh terminated: {e:#}");
        }
    });

    if open {
        let url = format!("http://{host}:{port}");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!("could not open browser: {e}");
            }
        });
    }

    let result = server.start().await;

    // Server is down (ctrl-c); tear down the stream subscription so its
    // unpublished state is discarded rather than left dangling.
    cancellation.cancel();
    result
}

/// Fold a recorded event stream through the full pipeline and print the
/// resulting layout. Useful for inspecting what the console would draw.
pub fn layout_file(file: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let events: Vec<ChangeEvent> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let mut registry = SchemaRegistry::new();
    for event in events {
        registry.apply(event);
    }

    let snapshot = registry.snapshot();
    let detail = ModuleDetail::default();
    let modules: Vec<Module> = snapshot
        .iter()
        .map(|schema| Module::from_schema(schema, &detail))
        .collect();

    let graph = build_call_graph(&modules);
    let result = layout(&modules, &graph);

    tracing::info!(
        modules = modules.len(),
        nodes = result.nodes.len(),
        edges = result.edges.len(),
        "layout computed"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
