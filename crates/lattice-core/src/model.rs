//! Core data structures for the module topology

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a module schema changed relative to the previous notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Changed,
    Removed,
}

/// One incremental schema-change notification from the upstream stream.
///
/// Events carry no sequence numbers; ordering is delivery order. A run of
/// events ending with `more == false` forms one batch, the atomic unit of
/// publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub module_name: String,
    pub change_type: ChangeType,
    /// Full replacement schema. Present for added/changed, absent for removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ModuleSchema>,
    /// True while more events of the same batch are still in flight.
    pub more: bool,
}

/// Immutable schema snapshot for one module. Replaced wholesale on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSchema {
    pub name: String,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl ModuleSchema {
    /// All verb declarations, in declaration order.
    pub fn verbs(&self) -> impl Iterator<Item = &Verb> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Verb(v) => Some(v),
            _ => None,
        })
    }
}

/// A single top-level declaration inside a module schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Decl {
    Verb(Verb),
    Data(Data),
    Enum(EnumDecl),
    Secret(Secret),
    Config(Config),
    Database(Database),
    Topic(Topic),
    Subscription(SubscriptionDecl),
    Fsm(Fsm),
}

/// A callable operation exposed by a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verb {
    pub name: String,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
}

impl Verb {
    /// All outbound call targets declared in this verb's metadata.
    pub fn calls(&self) -> impl Iterator<Item = &CallTarget> {
        self.metadata
            .iter()
            .filter_map(|m| match m {
                Metadata::Calls { calls } => Some(calls.iter()),
                Metadata::Ingress { .. } | Metadata::Cron { .. } | Metadata::Subscriber { .. } => {
                    None
                }
            })
            .flatten()
    }
}

/// Verb metadata, discriminated by kind and matched exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metadata {
    /// Outbound calls this verb makes to other verbs.
    Calls { calls: Vec<CallTarget> },
    /// HTTP ingress binding; ingress verbs have no outbound module calls.
    Ingress { method: String, path: String },
    /// Cron trigger binding.
    Cron { schedule: String },
    /// Topic subscription binding.
    Subscriber { topic: String },
}

/// A reference to a callee verb. An empty `module` marks a target without an
/// outbound module call and is skipped by the call graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallTarget {
    #[serde(default)]
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDecl {
    pub name: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fsm {
    pub name: String,
    #[serde(default)]
    pub states: Vec<String>,
}

/// Deployment identity of a running module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Runtime call statistics for a verb, when the backend reports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerbStats {
    pub request_count: u64,
    pub mean_latency_ms: f64,
}

/// Runtime detail for a module, fetched separately from the pure schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_text: Option<String>,
    #[serde(default)]
    pub verb_stats: HashMap<String, VerbStats>,
}

/// A verb as indexed: the schema declaration plus optional runtime fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbRecord {
    pub verb: Verb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<VerbStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// A module as held by the index: schema-derived lists plus runtime identity.
/// Lifecycle mirrors the registry entry it is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub verbs: Vec<VerbRecord>,
    pub secrets: Vec<SecretRecord>,
    pub configs: Vec<ConfigRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_text: Option<String>,
}

impl Module {
    /// Derive an index entry from a schema snapshot and its runtime detail.
    pub fn from_schema(schema: &ModuleSchema, detail: &ModuleDetail) -> Self {
        let mut verbs = Vec::new();
        let mut secrets = Vec::new();
        let mut configs = Vec::new();

        for decl in &schema.decls {
            match decl {
                Decl::Verb(v) => verbs.push(VerbRecord {
                    verb: v.clone(),
                    stats: detail.verb_stats.get(&v.name).copied(),
                }),
                Decl::Secret(s) => secrets.push(SecretRecord {
                    name: s.name.clone(),
                    provider: s.provider.clone(),
                }),
                Decl::Config(c) => configs.push(ConfigRecord {
                    name: c.name.clone(),
                    type_name: c.type_name.clone(),
                }),
                // Data shapes, enums, databases, topics, subscriptions and
                // FSMs carry no topology of their own.
                Decl::Data(_)
                | Decl::Enum(_)
                | Decl::Database(_)
                | Decl::Topic(_)
                | Decl::Subscription(_)
                | Decl::Fsm(_) => {}
            }
        }

        Module {
            name: schema.name.clone(),
            deployment: detail.deployment.clone(),
            language: detail.language.clone(),
            verbs,
            secrets,
            configs,
            schema_text: detail.schema_text.clone(),
        }
    }
}
