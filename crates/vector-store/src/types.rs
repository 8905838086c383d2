use serde::{Deserialize, Serialize};

/// What kind of code a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    File,
    EntryPoint,
}

/// A retrievable unit of code with metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable id, unique across the store.
    pub id: String,
    pub kind: ChunkKind,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: String,
    pub name: Option<String>,
    pub complexity: Option<usize>,
    /// Unique symbols mentioned by the chunk, chunk name first.
    pub symbols: Vec<String>,
    /// Derived from kind and complexity; always in `[0.0, 1.0]`.
    pub importance: f64,
    /// Rough token estimate (`content.len() / 4`).
    pub tokens: usize,
}

impl Chunk {
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// One selected slice of code inside a [`ContextWindow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub importance: f64,
}

/// The token-bounded bundle of chunks handed to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextWindow {
    pub chunks: Vec<ContextChunk>,
    pub total_tokens: usize,
    /// Deduplicated source files, in selection order.
    pub sources: Vec<String>,
}

/// Importance is a deterministic function of chunk kind and complexity.
pub fn calculate_importance(kind: ChunkKind, complexity: Option<usize>) -> f64 {
    let mut score: f64 = match kind {
        ChunkKind::Function => 0.7,
        ChunkKind::Class => 0.8,
        ChunkKind::Method => 0.6,
        ChunkKind::File => 0.4,
        ChunkKind::EntryPoint => 0.5,
    };

    let complexity = complexity.unwrap_or(0);
    if complexity > 5 {
        score += 0.1;
    }
    if complexity > 10 {
        score += 0.1;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_is_clamped_and_monotone_in_complexity() {
        assert_eq!(calculate_importance(ChunkKind::Function, None), 0.7);
        assert_eq!(calculate_importance(ChunkKind::Function, Some(6)), 0.8);
        assert!((calculate_importance(ChunkKind::Function, Some(11)) - 0.9).abs() < 1e-9);
        assert_eq!(calculate_importance(ChunkKind::Class, Some(20)), 1.0);
    }

    #[test]
    fn kind_deserializes_from_snake_case() {
        let kind: ChunkKind = serde_json::from_str("\"entry_point\"").unwrap();
        assert_eq!(kind, ChunkKind::EntryPoint);
    }
}
