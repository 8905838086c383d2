//! The query-answering pipeline.
//!
//! A question flows through cache lookup, intent classification, and an
//! intent-specific handler. Location, Usage and Dependency questions are
//! answered straight from the knowledge-base artifacts; everything else gets
//! a token-bounded context window assembled by hybrid retrieval and is sent
//! to the model endpoint behind an anti-hallucination prompt.

mod classifier;
mod context;
mod error;
mod fuzzy;
mod prompts;
mod router;

pub use classifier::{Classification, Classifier, Entity, EntityRole, Intent};
pub use context::{ContextBuilder, ContextConfig, MatchKind, ScoredChunk};
pub use error::{QueryError, Result};
pub use fuzzy::{fuzzy_score, fuzzy_suggestions};
pub use router::{Router, RouterOptions};
