use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("empty query")]
    EmptyQuery,

    #[error("token budget exhausted: {available} tokens available after reserves")]
    BudgetExhausted { available: i64 },

    #[error(transparent)]
    Kb(#[from] eulix_kb::KbError),

    #[error(transparent)]
    VectorStore(#[from] eulix_vector_store::VectorStoreError),

    #[error(transparent)]
    Llm(#[from] eulix_llm::LlmError),

    #[error(transparent)]
    Cache(#[from] eulix_cache::CacheError),
}
