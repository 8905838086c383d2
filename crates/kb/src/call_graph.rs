use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Call-graph adjacency map (`kb_call_graph.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    #[serde(default)]
    pub functions: HashMap<String, FunctionNode>,
    #[serde(default)]
    pub types: HashMap<String, TypeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    #[serde(default)]
    pub location: String,
    /// Outgoing callees.
    #[serde(default)]
    pub calls: Vec<String>,
    /// Incoming callers.
    #[serde(default)]
    pub called_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeNode {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

impl CallGraph {
    pub fn function(&self, name: &str) -> Option<&FunctionNode> {
        self.functions.get(name)
    }

    pub fn type_node(&self, name: &str) -> Option<&TypeNode> {
        self.types.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.types.is_empty()
    }

    /// Transitive callees of `start` up to `max_depth` hops, in discovery
    /// order. The start symbol itself is excluded; cycles are cut by the
    /// visited set.
    pub fn transitive_callees(&self, start: &str, max_depth: usize) -> Vec<String> {
        if max_depth == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut result = Vec::new();
        self.walk_callees(start, start, 0, max_depth, &mut visited, &mut result);
        result
    }

    fn walk_callees(
        &self,
        start: &str,
        name: &str,
        depth: usize,
        max_depth: usize,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        // `name` sits `depth` hops from `start`; its callees would land at
        // `depth + 1`, so expansion stops once the limit is reached.
        if depth >= max_depth {
            return;
        }

        if let Some(node) = self.functions.get(name) {
            for callee in &node.calls {
                if callee != start && visited.insert(callee.clone()) {
                    result.push(callee.clone());
                    self.walk_callees(start, callee, depth + 1, max_depth, visited, result);
                }
            }
        }
    }
}
