use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("vector store not found at {0} (run `eulix analyze` to regenerate embeddings)")]
    Missing(PathBuf),

    #[error("vector store corrupt: {0}")]
    Corrupt(String),

    #[error("vector dimension mismatch: config expects {expected}, store has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query embedder failed: {0}")]
    Embedder(String),

    #[error("embedder protocol error: {0}")]
    EmbedderProtocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
