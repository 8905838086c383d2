//! Change detection over a source tree.
//!
//! The detector hashes every source file, derives a deterministic aggregate
//! digest for the whole tree, and compares it against the record persisted by
//! the previous analysis run. The resulting change fraction gates reuse of
//! the knowledge base and the response cache.

mod detector;
mod error;

pub use detector::{ChangeAction, Checksum, Detector, Thresholds, CHECKSUM_FILE};
pub use error::{ChecksumError, Result};
