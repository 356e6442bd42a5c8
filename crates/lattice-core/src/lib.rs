//! Lattice Core — schema reconciliation, call graph, and topology layout

pub mod callgraph;
pub mod index;
pub mod layout;
pub mod model;
pub mod registry;


#[cfg(test)]
pub mod test_utils;

pub use callgraph::{build_call_graph, CallGraph, CallRef};
pub use index::{DetailError, ModuleDetailSource, ModuleIndex, NullDetailSource};
pub use layout::{layout, Layout, LayoutEdge, LayoutNode, LayoutNodeKind};
pub use model::{
    ChangeEvent, ChangeType, Decl, Deployment, Metadata, Module, ModuleDetail, ModuleSchema,
    Verb, VerbRecord, VerbStats,
};
pub use registry::{SchemaRegistry, SchemaSnapshot};
