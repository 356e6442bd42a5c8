//! Test fixtures for lattice-core

use crate::model::{
    CallTarget, ChangeEvent, ChangeType, Config, Decl, Metadata, Module, ModuleDetail,
    ModuleSchema, Secret, Verb,
};

/// A verb declaration that calls each `(module, verb)` target.
pub fn verb(name: &str, calls: &[(&str, &str)]) -> Decl {
    let metadata = if calls.is_empty() {
        Vec::new()
    } else {
        vec![Metadata::Calls {
            calls: calls
                .iter()
                .map(|(module, verb)| CallTarget {
                    module: module.to_string(),
                    name: verb.to_string(),
                })
                .collect(),
        }]
    };
    Decl::Verb(Verb {
        name: name.to_string(),
        comments: Vec::new(),
        request: None,
        response: None,
        metadata,
    })
}

pub fn secret(name: &str) -> Decl {
    Decl::Secret(Secret {
        name: name.to_string(),
        provider: None,
    })
}

pub fn config(name: &str) -> Decl {
    Decl::Config(Config {
        name: name.to_string(),
        type_name: None,
    })
}

pub fn schema(name: &str, decls: Vec<Decl>) -> ModuleSchema {
    ModuleSchema {
        name: name.to_string(),
        comments: Vec::new(),
        decls,
    }
}

pub fn event(
    name: &str,
    change_type: ChangeType,
    schema: Option<ModuleSchema>,
    more: bool,
) -> ChangeEvent {
    ChangeEvent {
        module_name: name.to_string(),
        change_type,
        schema,
        more,
    }
}

/// Index entries derived from schemas with no runtime detail.
pub fn modules(schemas: &[ModuleSchema]) -> Vec<Module> {
    let detail = ModuleDetail::default();
    schemas
        .iter()
        .map(|s| Module::from_schema(s, &detail))
        .collect()
}
