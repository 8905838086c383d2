//! Precomputed chunk embeddings.
//!
//! A vector store is a pair of artifacts written by the embedding pipeline:
//! a compact binary vector file (`embeddings.bin`) and a JSON sidecar
//! (`embeddings.json`) carrying chunk metadata and content. Both are loaded
//! once per session and are read-only afterwards. Query vectors come from an
//! external embedder binary spoken to over stdout.

mod embedder;
mod error;
mod store;
mod types;

pub use embedder::QueryEmbedder;
pub use error::{Result, VectorStoreError};
pub use store::{load_chunks_only, VectorStore, EMBEDDINGS_BIN_FILE, EMBEDDINGS_JSON_FILE};
pub use types::{calculate_importance, Chunk, ChunkKind, ContextChunk, ContextWindow};
