use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use tokio::time::{timeout, Duration};

pub const KEY_PREFIX: &str = "eulix:query:";

const OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value backend with native TTL.
pub struct FastBackend {
    conn: ConnectionManager,
}

fn key_for(query_hash: &str) -> String {
    format!("{KEY_PREFIX}{query_hash}")
}

/// Every call to the fast backend carries an explicit deadline.
async fn with_deadline<T, F>(future: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match timeout(OP_TIMEOUT, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CacheError::Fast(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "operation timed out",
        )))),
    }
}

impl FastBackend {
    /// Connect and verify the server responds to PING.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = with_deadline(client.get_connection_manager()).await?;
        with_deadline(redis::cmd("PING").query_async::<()>(&mut conn)).await?;
        Ok(Self { conn })
    }

    /// Fetch by key, validating checksum then expiry. Stale entries are
    /// deleted on detection (the fast backend is never scanned wholesale).
    pub async fn get(
        &self,
        query_hash: &str,
        current_checksum: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let key = key_for(query_hash);
        let raw: Option<String> = with_deadline(conn.get(&key)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.checksum_hash != current_checksum || entry.is_expired_at(now) {
            with_deadline(conn.del::<_, ()>(&key)).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub async fn set(&self, entry: &CacheEntry, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(entry)?;
        with_deadline(conn.set_ex::<_, _, ()>(key_for(&entry.query_hash), raw, ttl_seconds))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, query_hash: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        with_deadline(conn.del::<_, ()>(key_for(query_hash))).await?;
        Ok(())
    }

    pub async fn is_reachable(&self) -> bool {
        let mut conn = self.conn.clone();
        with_deadline(redis::cmd("PING").query_async::<()>(&mut conn))
            .await
            .is_ok()
    }

    /// Prefix scan used only when no durable backend exists.
    pub async fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = with_deadline(conn.keys(format!("{KEY_PREFIX}*"))).await?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = with_deadline(conn.get(&key)).await?;
            let Some(raw) = raw else { continue };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Skipping undecodable cache entry {key}: {e}"),
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}
