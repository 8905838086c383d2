use crate::call_graph::CallGraph;
use crate::error::{KbError, Result};
use crate::types::{KbIndex, KnowledgeBase};
use std::path::Path;

pub const KB_FILE: &str = "kb.json";
pub const KB_INDEX_FILE: &str = "kb_index.json";
pub const CALL_GRAPH_FILE: &str = "kb_call_graph.json";

/// Load the full knowledge base from the session directory.
pub fn load_kb(session_dir: &Path) -> Result<KnowledgeBase> {
    let path = session_dir.join(KB_FILE);
    if !path.exists() {
        return Err(KbError::KnowledgeBaseMissing(path));
    }
    let data = std::fs::read(&path)?;
    let kb: KnowledgeBase =
        serde_json::from_slice(&data).map_err(|source| KbError::Parse { path, source })?;
    log::debug!(
        "Loaded knowledge base: {} files, {} functions",
        kb.structure.len(),
        kb.metadata.total_functions
    );
    Ok(kb)
}

/// Load the cross-file symbol indices from the session directory.
pub fn load_kb_index(session_dir: &Path) -> Result<KbIndex> {
    let path = session_dir.join(KB_INDEX_FILE);
    if !path.exists() {
        return Err(KbError::KnowledgeBaseMissing(path));
    }
    let data = std::fs::read(&path)?;
    let index: KbIndex =
        serde_json::from_slice(&data).map_err(|source| KbError::Parse { path, source })?;
    log::debug!(
        "Loaded KB index: {} functions, {} types",
        index.functions_by_name.len(),
        index.types_by_name.len()
    );
    Ok(index)
}

/// Load the call-graph adjacency map from the session directory.
pub fn load_call_graph(session_dir: &Path) -> Result<CallGraph> {
    let path = session_dir.join(CALL_GRAPH_FILE);
    if !path.exists() {
        return Err(KbError::CallGraphMissing(path));
    }
    let data = std::fs::read(&path)?;
    serde_json::from_slice(&data).map_err(|source| KbError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_index_reports_path() {
        let dir = TempDir::new().unwrap();
        let err = load_kb_index(dir.path()).unwrap_err();
        assert!(matches!(err, KbError::KnowledgeBaseMissing(_)));
    }

    #[test]
    fn index_round_trips() {
        let dir = TempDir::new().unwrap();
        let raw = serde_json::json!({
            "functions_by_name": {"authenticate_user": ["src/auth.py:10"]},
            "types_by_name": {"DownloadManager": ["src/dl.py:42"]},
            "functions_calling": {"hash_password": ["authenticate_user"]}
        });
        std::fs::write(
            dir.path().join(KB_INDEX_FILE),
            serde_json::to_vec(&raw).unwrap(),
        )
        .unwrap();

        let index = load_kb_index(dir.path()).unwrap();
        assert!(index.is_function("authenticate_user"));
        assert!(index.is_type("DownloadManager"));
        assert_eq!(
            index.functions_calling["hash_password"],
            vec!["authenticate_user".to_string()]
        );
    }

    #[test]
    fn kb_round_trips_structure_and_metadata() {
        let dir = TempDir::new().unwrap();
        let raw = serde_json::json!({
            "metadata": {
                "project_name": "demo",
                "version": "1.0",
                "total_files": 1,
                "total_functions": 2,
                "total_classes": 1
            },
            "structure": {
                "src/auth.py": {
                    "language": "python",
                    "loc": 120,
                    "imports": [{"module": "hashlib", "items": [], "import_type": "external"}],
                    "functions": [{
                        "id": "src/auth.py::authenticate_user",
                        "name": "authenticate_user",
                        "signature": "def authenticate_user(username, password)",
                        "docstring": "Check credentials.",
                        "line_start": 10,
                        "line_end": 30,
                        "calls": [{"callee": "hash_password", "line": 14}],
                        "called_by": ["login_endpoint"],
                        "complexity": 4
                    }],
                    "classes": [{
                        "id": "src/auth.py::Session",
                        "name": "Session",
                        "line_start": 40,
                        "line_end": 80,
                        "bases": ["BaseSession"],
                        "methods": []
                    }]
                }
            },
            "indices": {
                "functions_by_name": {"authenticate_user": ["src/auth.py:10"]},
                "types_by_name": {"Session": ["src/auth.py:40"]}
            },
            "entry_points": [{"function": "main", "file": "src/main.py", "line": 1}]
        });
        std::fs::write(dir.path().join(KB_FILE), serde_json::to_vec(&raw).unwrap()).unwrap();

        let kb = load_kb(dir.path()).unwrap();
        assert_eq!(kb.metadata.project_name, "demo");
        let file = &kb.structure["src/auth.py"];
        assert_eq!(file.language, "python");
        assert_eq!(file.functions[0].calls[0].callee, "hash_password");
        assert_eq!(file.functions[0].called_by, vec!["login_endpoint".to_string()]);
        assert_eq!(file.classes[0].bases, vec!["BaseSession".to_string()]);
        assert_eq!(kb.entry_points[0].function, "main");
    }

    #[test]
    fn call_graph_parses_nodes() {
        let dir = TempDir::new().unwrap();
        let raw = serde_json::json!({
            "functions": {
                "authenticate_user": {
                    "name": "authenticate_user",
                    "location": "src/auth.py:10",
                    "calls": ["hash_password"],
                    "called_by": ["login_endpoint"]
                }
            },
            "types": {}
        });
        std::fs::write(
            dir.path().join(CALL_GRAPH_FILE),
            serde_json::to_vec(&raw).unwrap(),
        )
        .unwrap();

        let graph = load_call_graph(dir.path()).unwrap();
        let node = graph.function("authenticate_user").unwrap();
        assert_eq!(node.calls, vec!["hash_password".to_string()]);
        assert_eq!(node.called_by, vec!["login_endpoint".to_string()]);
    }
}
