//! REST API handlers for the console server

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use axum_extra::extract::Query;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

use lattice_core::{Layout, Module};

use crate::ServerState;

const DEFAULT_SEARCH_LIMIT: usize = 20;

/// One row of the module listing.
#[derive(Debug, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub deployment_key: Option<String>,
    pub language: Option<String>,
    pub verb_count: usize,
    pub secret_count: usize,
    pub config_count: usize,
}

impl From<&Module> for ModuleSummary {
    fn from(module: &Module) -> Self {
        ModuleSummary {
            name: module.name.clone(),
            deployment_key: module.deployment.as_ref().map(|d| d.key.clone()),
            language: module.language.clone(),
            verb_count: module.verbs.len(),
            secret_count: module.secrets.len(),
            config_count: module.configs.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

/// A fuzzy-search hit over module and verb names.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    /// Module name or `"{module}.{verb}"`.
    pub id: String,
    pub kind: String,
    pub score: i64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub modules: usize,
}

/// The current topology layout as produced by the last refresh pass.
pub async fn get_topology(State(state): State<Arc<ServerState>>) -> Json<Layout> {
    let layout = state.layout.read().await;
    Json(layout.clone())
}

/// All indexed modules, summarized and sorted by name.
pub async fn list_modules(State(state): State<Arc<ServerState>>) -> Json<Vec<ModuleSummary>> {
    let modules = state.index.all();
    Json(modules.iter().map(ModuleSummary::from).collect())
}

/// Full detail for one module.
pub async fn get_module(
    Path(name): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Module>, StatusCode> {
    state
        .index
        .get(&name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Fuzzy search over module names and qualified verb names.
pub async fn search(
    Query(params): Query<SearchParams>,
    State(state): State<Arc<ServerState>>,
) -> Json<Vec<SearchHit>> {
    let matcher = SkimMatcherV2::default();
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let mut hits = Vec::new();
    for module in state.index.all() {
        if let Some(score) = matcher.fuzzy_match(&module.name, &params.q) {
            hits.push(SearchHit {
                id: module.name.clone(),
                kind: "module".to_string(),
                score,
            });
        }
        for verb in &module.verbs {
            let qualified = format!("{}.{}", module.name, verb.verb.name);
            if let Some(score) = matcher.fuzzy_match(&qualified, &params.q) {
                hits.push(SearchHit {
                    id: qualified,
                    kind: "verb".to_string(),
                    score,
                });
            }
        }
    }

    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(limit);
    Json(hits)
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        modules: state.index.len(),
    };
    Json(health)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::model::{Decl, ModuleSchema, Verb};

    fn indexed_state(names: &[(&str, &[&str])]) -> Arc<ServerState> {
        let state = Arc::new(ServerState::new());
        let schemas: Vec<ModuleSchema> = names
            .iter()
            .map(|(name, verbs)| ModuleSchema {
                name: name.to_string(),
                comments: Vec::new(),
                decls: verbs
                    .iter()
                    .map(|v| {
                        Decl::Verb(Verb {
                            name: v.to_string(),
                            comments: Vec::new(),
                            request: None,
                            response: None,
                            metadata: Vec::new(),
                        })
                    })
                    .collect(),
            })
            .collect();
        let details = std::collections::HashMap::new();
        state.index.rebuild(&schemas, &details);
        state
    }

    #[tokio::test]
    async fn topology_starts_empty() {
        let state = Arc::new(ServerState::new());
        let Json(layout) = get_topology(State(state)).await;
        assert!(layout.nodes.is_empty());
        assert!(layout.edges.is_empty());
    }

    #[tokio::test]
    async fn module_listing_summarizes_the_index() {
        let state = indexed_state(&[("auth", &["check"]), ("billing", &["charge", "refund"])]);
        let Json(summaries) = list_modules(State(state)).await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "auth");
        assert_eq!(summaries[1].verb_count, 2);
    }

    #[tokio::test]
    async fn unknown_module_is_not_found() {
        let state = Arc::new(ServerState::new());
        let result = get_module(Path("ghost".to_string()), State(state)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn search_ranks_and_limits_hits() {
        let state = indexed_state(&[("auth", &["check"]), ("author", &[])]);
        let Json(hits) = search(
            Query(SearchParams {
                q: "auth".to_string(),
                limit: Some(1),
            }),
            State(state),
        )
        .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "auth", "exact name outranks the longer match");
    }

    #[tokio::test]
    async fn search_misses_return_empty() {
        let state = indexed_state(&[("auth", &["check"])]);
        let Json(hits) = search(
            Query(SearchParams {
                q: "zzzz".to_string(),
                limit: None,
            }),
            State(state),
        )
        .await;
        assert!(hits.is_empty());
    }
}
