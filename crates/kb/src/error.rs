use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KbError>;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("knowledge base not found at {0} (run `eulix analyze` to generate it)")]
    KnowledgeBaseMissing(PathBuf),

    #[error("call graph not found at {0} (run `eulix analyze` to regenerate analysis)")]
    CallGraphMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
