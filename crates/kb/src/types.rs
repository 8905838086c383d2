use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level knowledge base as persisted by the parser (`kb.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub metadata: KbMetadata,
    /// File path -> parsed file data.
    pub structure: HashMap<String, FileData>,
    #[serde(default)]
    pub call_graph: serde_json::Value,
    #[serde(default)]
    pub dependency_graph: serde_json::Value,
    pub indices: KbIndex,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default)]
    pub external_dependencies: Vec<String>,
    #[serde(default)]
    pub patterns: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbMetadata {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_loc: usize,
    #[serde(default)]
    pub total_functions: usize,
    #[serde(default)]
    pub total_classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileData {
    pub language: String,
    #[serde(default)]
    pub loc: usize,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub module: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub import_type: String,
}

/// A parsed function or method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub docstring: String,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub return_type: String,
    /// Outgoing call sites.
    #[serde(default)]
    pub calls: Vec<FunctionCall>,
    /// Names of functions that call this one.
    #[serde(default)]
    pub called_by: Vec<String>,
    #[serde(default)]
    pub complexity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub type_annotation: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub callee: String,
    #[serde(default)]
    pub defined_in: Option<String>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub docstring: String,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub methods: Vec<Function>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub function: String,
    pub file: String,
    #[serde(default)]
    pub line: usize,
}

/// Cross-file lookup indices (`kb_index.json`).
///
/// Locations are `"file:line"` strings; a name can resolve to several
/// locations when it is defined in more than one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbIndex {
    #[serde(default)]
    pub functions_by_name: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub types_by_name: HashMap<String, Vec<String>>,
    /// Reverse index: callee name -> callers.
    #[serde(default)]
    pub functions_calling: HashMap<String, Vec<String>>,
}

impl KbIndex {
    pub fn is_type(&self, name: &str) -> bool {
        self.types_by_name.contains_key(name)
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions_by_name.contains_key(name)
    }
}
