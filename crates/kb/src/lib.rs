//! Knowledge-base artifacts produced by the static parser.
//!
//! Everything in this crate is loaded once at session start and treated as
//! immutable afterwards: the tree-of-files knowledge base (`kb.json`), the
//! cross-file symbol indices (`kb_index.json`) and the call-graph adjacency
//! map (`kb_call_graph.json`).

mod call_graph;
mod error;
mod loader;
mod types;

pub use call_graph::{CallGraph, FunctionNode, TypeNode};
pub use error::{KbError, Result};
pub use loader::{load_call_graph, load_kb, load_kb_index};
pub use types::{
    Class, EntryPoint, FileData, Function, FunctionCall, Import, KbIndex, KbMetadata,
    KnowledgeBase, Parameter,
};
