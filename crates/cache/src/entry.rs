use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One cached answer, as stored in either backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query_hash: String,
    pub query: String,
    pub response: String,
    pub checksum_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// SHA-256 over the raw UTF-8 query bytes. Deliberately no trimming or case
/// folding: whitespace-sensitive keys are part of the contract.
pub fn hash_query(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_whitespace_sensitive() {
        assert_ne!(hash_query("what is main?"), hash_query("what is main? "));
        assert_eq!(hash_query("q"), hash_query("q"));
    }
}
