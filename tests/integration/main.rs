//! Integration tests for Lattice
//!
//! These tests verify that the crates work together correctly: events in,
//! topology out, over the same wiring the serve command uses.

use std::sync::Arc;

use lattice_core::model::{CallTarget, Decl, Metadata, Verb};
use lattice_core::{ChangeEvent, ChangeType, ModuleSchema, NullDetailSource};
use lattice_server::websocket::WsMessage;
use lattice_server::{ServerConfig, ServerState, TopologyServer};
use lattice_stream::{Cancellation, RefreshService};

fn verb_decl(name: &str, calls: &[(&str, &str)]) -> Decl {
    Decl::Verb(Verb {
        name: name.to_string(),
        comments: Vec::new(),
        request: None,
        response: None,
        metadata: vec![Metadata::Calls {
            calls: calls
                .iter()
                .map(|(module, verb)| CallTarget {
                    module: module.to_string(),
                    name: verb.to_string(),
                })
                .collect(),
        }],
    })
}

fn added(name: &str, decls: Vec<Decl>, more: bool) -> ChangeEvent {
    ChangeEvent {
        module_name: name.to_string(),
        change_type: ChangeType::Added,
        schema: Some(ModuleSchema {
            name: name.to_string(),
            comments: Vec::new(),
            decls,
        }),
        more,
    }
}

fn removed(name: &str) -> ChangeEvent {
    ChangeEvent {
        module_name: name.to_string(),
        change_type: ChangeType::Removed,
        schema: None,
        more: false,
    }
}

fn refresher(state: &Arc<ServerState>, cancellation: &Cancellation) -> RefreshService {
    RefreshService::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.index),
        Arc::new(NullDetailSource),
        Arc::clone(&state.layout),
        state.update_tx.clone(),
        cancellation.token(),
    )
}

/// A fresh server starts with an empty registry, index, and layout.
#[tokio::test]
async fn test_server_startup() {
    let server = TopologyServer::new(ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    });
    let state = server.state();

    assert!(state.registry.read().await.snapshot().is_empty());
    assert!(state.index.is_empty());
    assert!(state.layout.read().await.nodes.is_empty());
}

/// Events stream in, the refresh pass runs, and the served topology reflects
/// ranks, positions, and call edges.
#[tokio::test]
async fn test_events_to_topology() {
    let state = Arc::new(ServerState::new());
    let cancellation = Cancellation::new();
    let refresh = refresher(&state, &cancellation);

    {
        let mut registry = state.registry.write().await;
        registry.apply(added("auth", vec![verb_decl("check", &[])], true));
        registry.apply(added(
            "billing",
            vec![verb_decl("charge", &[("auth", "check")])],
            false,
        ));
    }

    let snapshot = state.registry.read().await.snapshot();
    refresh.refresh(&snapshot).await;

    let layout = state.layout.read().await;
    let auth = layout.nodes.iter().find(|n| n.id == "auth").unwrap();
    let billing = layout.nodes.iter().find(|n| n.id == "billing").unwrap();
    assert_eq!(auth.rank, Some(1));
    assert_eq!(billing.rank, Some(0));
    assert!(auth.x > billing.x);

    let edge_ids: Vec<&str> = layout.edges.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(edge_ids, vec!["billing.charge-auth.check"]);
}

/// Removing a module drops its node and edges from the next refresh.
#[tokio::test]
async fn test_removed_module_leaves_the_topology() {
    let state = Arc::new(ServerState::new());
    let cancellation = Cancellation::new();
    let refresh = refresher(&state, &cancellation);

    {
        let mut registry = state.registry.write().await;
        registry.apply(added("auth", vec![verb_decl("check", &[])], true));
        registry.apply(added(
            "billing",
            vec![verb_decl("charge", &[("auth", "check")])],
            false,
        ));
    }
    let snapshot = state.registry.read().await.snapshot();
    refresh.refresh(&snapshot).await;
    assert_eq!(state.layout.read().await.edges.len(), 1);

    state.registry.write().await.apply(removed("billing"));
    let snapshot = state.registry.read().await.snapshot();
    refresh.refresh(&snapshot).await;

    let layout = state.layout.read().await;
    assert!(layout.nodes.iter().all(|n| n.id != "billing"));
    assert!(layout.edges.is_empty());
    assert!(state.index.get("billing").is_none());
}

/// Refresh passes broadcast frames WebSocket clients can parse.
#[tokio::test]
async fn test_refresh_broadcasts_parseable_frames() {
    let state = Arc::new(ServerState::new());
    let cancellation = Cancellation::new();
    let refresh = refresher(&state, &cancellation);
    let mut updates = state.update_tx.subscribe();

    state
        .registry
        .write()
        .await
        .apply(added("auth", vec![verb_decl("check", &[])], false));
    let snapshot = state.registry.read().await.snapshot();
    refresh.refresh(&snapshot).await;

    let frame = updates.try_recv().unwrap();
    let message: WsMessage = serde_json::from_str(&frame).unwrap();
    match message {
        WsMessage::Topology { layout } => {
            assert_eq!(layout.nodes.len(), 2, "module node plus verb node");
        }
        other => panic!("expected a topology frame, got {other:?}"),
    }
}

/// A recorded event file — the `lattice layout` input format — folds through
/// the pipeline like the live stream does.
#[test]
fn test_recorded_event_file_folds_through_the_pipeline() {
    use std::io::Write;

    let recorded = r#"[
        {"module_name":"auth","change_type":"added",
         "schema":{"name":"auth","decls":[{"decl":"verb","name":"check"}]},"more":true},
        {"module_name":"billing","change_type":"added",
         "schema":{"name":"billing","decls":[{"decl":"verb","name":"charge",
           "metadata":[{"kind":"calls","calls":[{"module":"auth","name":"check"}]}]}]},
         "more":false}
    ]"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(recorded.as_bytes()).unwrap();

    let raw = std::fs::read_to_string(file.path()).unwrap();
    let events: Vec<ChangeEvent> = serde_json::from_str(&raw).unwrap();

    let mut registry = lattice_core::SchemaRegistry::new();
    for event in events {
        registry.apply(event);
    }
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 2);

    let detail = lattice_core::ModuleDetail::default();
    let modules: Vec<lattice_core::Module> = snapshot
        .iter()
        .map(|schema| lattice_core::Module::from_schema(schema, &detail))
        .collect();
    let graph = lattice_core::build_call_graph(&modules);
    let layout = lattice_core::layout(&modules, &graph);

    assert_eq!(layout.edges.len(), 1);
    assert_eq!(layout.edges[0].id, "billing.charge-auth.check");
}

/// The WebSocket protocol round-trips through serde.
#[test]
fn test_ws_protocol_round_trip() {
    let original = WsMessage::Ping;
    let json = serde_json::to_string(&original).unwrap();
    assert!(json.contains("ping"));

    let parsed: WsMessage = serde_json::from_str(&json).unwrap();
    assert!(matches!(parsed, WsMessage::Ping));
}
