use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChecksumError>;

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored checksum at {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode checksum record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
}
