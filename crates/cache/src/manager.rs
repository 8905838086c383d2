use crate::durable::DurableBackend;
use crate::entry::{hash_query, CacheEntry};
use crate::error::{CacheError, Result};
use crate::fast::FastBackend;
use chrono::{Duration, Utc};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FastOptions {
    pub url: String,
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub fast: Option<FastOptions>,
    /// Path of the embedded database; `None` disables the durable backend.
    pub durable_path: Option<PathBuf>,
}

/// Which backends this session writes to, fixed at construction.
enum Backend {
    Fast(FastBackend),
    Durable(DurableBackend),
    Both {
        fast: FastBackend,
        durable: DurableBackend,
    },
}

impl Backend {
    fn fast(&self) -> Option<&FastBackend> {
        match self {
            Backend::Fast(fast) | Backend::Both { fast, .. } => Some(fast),
            Backend::Durable(_) => None,
        }
    }

    fn durable(&self) -> Option<&DurableBackend> {
        match self {
            Backend::Durable(durable) | Backend::Both { durable, .. } => Some(durable),
            Backend::Fast(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub durable_total: usize,
    pub durable_valid: usize,
    pub fast_enabled: bool,
    pub fast_reachable: bool,
}

/// Front door for both backends; sole writer in a session.
pub struct Manager {
    backend: Backend,
    ttl: Duration,
}

impl Manager {
    /// Resolve the backend combination from configuration.
    ///
    /// An unreachable fast backend is downgraded with a warning rather than
    /// failing the session; `Ok(None)` means caching is disabled entirely.
    pub async fn connect(opts: CacheOptions) -> Result<Option<Self>> {
        let ttl_hours = opts
            .fast
            .as_ref()
            .map(|f| f.ttl_hours)
            .filter(|&h| h > 0)
            .unwrap_or(24);

        let fast = match &opts.fast {
            Some(fast_opts) => match FastBackend::connect(&fast_opts.url).await {
                Ok(backend) => Some(backend),
                Err(e) => {
                    log::warn!("Fast cache backend unavailable, continuing without it: {e}");
                    None
                }
            },
            None => None,
        };

        let durable = match &opts.durable_path {
            Some(path) => Some(DurableBackend::open(path)?),
            None => None,
        };

        let backend = match (fast, durable) {
            (Some(fast), Some(durable)) => Backend::Both { fast, durable },
            (Some(fast), None) => Backend::Fast(fast),
            (None, Some(durable)) => Backend::Durable(durable),
            (None, None) => return Ok(None),
        };

        Ok(Some(Self {
            backend,
            ttl: Duration::hours(ttl_hours as i64),
        }))
    }

    #[cfg(test)]
    pub(crate) fn durable_only_for_tests(durable: DurableBackend, ttl: Duration) -> Self {
        Self {
            backend: Backend::Durable(durable),
            ttl,
        }
    }

    /// Look up a validated answer. Backend failures degrade to a miss.
    pub async fn get(&self, query: &str, current_checksum: &str) -> Option<String> {
        let query_hash = hash_query(query);
        let now = Utc::now();

        if let Some(fast) = self.backend.fast() {
            match fast.get(&query_hash, current_checksum, now).await {
                Ok(Some(entry)) => return Some(entry.response),
                Ok(None) => {}
                Err(e) => log::warn!("Fast cache read failed: {e}"),
            }
        }

        if let Some(durable) = self.backend.durable() {
            match durable.get(&query_hash, current_checksum, now) {
                Ok(Some(entry)) => return Some(entry.response),
                Ok(None) => {}
                Err(e) => log::warn!("Durable cache read failed: {e}"),
            }
        }

        None
    }

    /// Store an answer in every enabled backend. Writes are independent; a
    /// failed backend is reported but does not undo the other.
    pub async fn set(&self, query: &str, response: &str, checksum: &str) -> Result<()> {
        let now = Utc::now();
        let entry = CacheEntry {
            query_hash: hash_query(query),
            query: query.to_string(),
            response: response.to_string(),
            checksum_hash: checksum.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        let ttl_seconds = self.ttl.num_seconds().max(1) as u64;

        let fast_write = async {
            match self.backend.fast() {
                Some(fast) => fast.set(&entry, ttl_seconds).await.err(),
                None => None,
            }
        };
        let durable_write = async {
            match self.backend.durable() {
                Some(durable) => durable.set(&entry).err(),
                None => None,
            }
        };
        let (fast_err, durable_err) = tokio::join!(fast_write, durable_write);

        let mut failures = Vec::new();
        if let Some(e) = fast_err {
            failures.push(format!("fast: {e}"));
        }
        if let Some(e) = durable_err {
            failures.push(format!("durable: {e}"));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CacheError::PartialWrite(failures.join("; ")))
        }
    }

    /// Remove one entry from every enabled backend.
    pub async fn delete(&self, query_hash: &str) -> Result<()> {
        if let Some(fast) = self.backend.fast() {
            fast.delete(query_hash).await?;
        }
        if let Some(durable) = self.backend.durable() {
            durable.delete(query_hash)?;
        }
        Ok(())
    }

    /// Drop durable entries computed against another tree. The fast backend
    /// is not scanned; its stale entries die at read validation or TTL.
    pub fn invalidate_by_checksum(&self, current_checksum: &str) -> Result<usize> {
        match self.backend.durable() {
            Some(durable) => durable.invalidate_by_checksum(current_checksum),
            None => Ok(0),
        }
    }

    pub fn clean_expired(&self) -> Result<usize> {
        match self.backend.durable() {
            Some(durable) => durable.clean_expired(Utc::now()),
            None => Ok(0),
        }
    }

    /// All entries, newest first. Durable is authoritative; the fast prefix
    /// scan is only used when it is the sole backend.
    pub async fn list(&self) -> Result<Vec<CacheEntry>> {
        if let Some(durable) = self.backend.durable() {
            return durable.list();
        }
        match self.backend.fast() {
            Some(fast) => fast.list().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        if let Some(durable) = self.backend.durable() {
            let (total, valid) = durable.stats(Utc::now())?;
            stats.durable_total = total;
            stats.durable_valid = valid;
        }
        if let Some(fast) = self.backend.fast() {
            stats.fast_enabled = true;
            stats.fast_reachable = fast.is_reachable().await;
        }
        Ok(stats)
    }
}
