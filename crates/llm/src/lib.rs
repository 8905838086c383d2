//! HTTP clients for the two supported model endpoints.
//!
//! Only the request/response contract lives here; prompt policy belongs to
//! the query router. Both providers speak simple chat-message JSON: the
//! remote provider authenticates with an API key header, the local server is
//! an unauthenticated instance reachable under `llm.base_url`.

mod client;
mod error;

pub use client::{Client, LlmOptions};
pub use error::{LlmError, Result};
