use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("LLM provider '{provider}' returned status {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("empty response from provider '{provider}'")]
    EmptyResponse { provider: String },
}
