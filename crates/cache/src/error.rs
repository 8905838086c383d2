use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("fast cache backend error: {0}")]
    Fast(#[from] redis::RedisError),

    #[error("durable cache backend error: {0}")]
    Durable(#[from] rusqlite::Error),

    #[error("cache entry corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("cache write incomplete: {0}")]
    PartialWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
