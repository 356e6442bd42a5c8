//! Module index: schema snapshots joined with runtime detail

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::model::{Module, ModuleDetail, ModuleSchema};

/// Errors from a module-detail backend.
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("detail transport error: {0}")]
    Transport(String),
    #[error("detail decode error: {0}")]
    Decode(String),
}

/// Source of runtime module detail (deployment identity, language, verb
/// stats) keyed by module name. Queried on every registry publication.
#[async_trait]
pub trait ModuleDetailSource: Send + Sync {
    async fn fetch_details(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, ModuleDetail>, DetailError>;
}

/// A detail source that knows nothing. Used by the offline CLI and in tests;
/// every module comes back with default (empty) detail.
pub struct NullDetailSource;

#[async_trait]
impl ModuleDetailSource for NullDetailSource {
    async fn fetch_details(
        &self,
        _names: &[String],
    ) -> Result<HashMap<String, ModuleDetail>, DetailError> {
        Ok(HashMap::new())
    }
}

/// Name-keyed module table, rebuilt wholesale whenever the schema registry
/// publishes. Thread-safe for concurrent reads from request handlers.
pub struct ModuleIndex {
    modules: DashMap<String, Module>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        ModuleIndex {
            modules: DashMap::new(),
        }
    }

    /// Replace the index contents with entries derived from `snapshot`.
    /// Modules absent from the detail map get default detail.
    pub fn rebuild(&self, snapshot: &[ModuleSchema], details: &HashMap<String, ModuleDetail>) {
        let default_detail = ModuleDetail::default();
        self.modules
            .retain(|name, _| snapshot.iter().any(|s| s.name == *name));
        for schema in snapshot {
            let detail = details.get(&schema.name).unwrap_or(&default_detail);
            self.modules
                .insert(schema.name.clone(), Module::from_schema(schema, detail));
        }
    }

    /// Look up one module by name.
    pub fn get(&self, name: &str) -> Option<Module> {
        self.modules.get(name).map(|r| r.value().clone())
    }

    /// All modules, sorted by name.
    pub fn all(&self) -> Vec<Module> {
        let mut modules: Vec<Module> = self
            .modules
            .iter()
            .map(|r| r.value().clone())
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleIndex {
    fn default() -> Self {
        Self::new()
    }
}
