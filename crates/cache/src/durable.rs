use crate::entry::CacheEntry;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Embedded relational backend.
pub struct DurableBackend {
    conn: Mutex<Connection>,
}

impl DurableBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let backend = Self {
            conn: Mutex::new(conn),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let backend = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                query_hash    TEXT PRIMARY KEY,
                query         TEXT NOT NULL,
                response      TEXT NOT NULL,
                checksum_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                expires_at    TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_checksum_hash ON cache_entries(checksum_hash);
            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            CREATE INDEX IF NOT EXISTS idx_created_at ON cache_entries(created_at);
            "#,
        )?;
        Ok(())
    }

    /// Fetch by key, validating checksum then expiry. Stale rows are deleted
    /// on detection and reported as a miss.
    pub fn get(
        &self,
        query_hash: &str,
        current_checksum: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let entry: Option<CacheEntry> = conn
            .query_row(
                "SELECT query_hash, query, response, checksum_hash, created_at, expires_at
                 FROM cache_entries WHERE query_hash = ?1",
                params![query_hash],
                row_to_entry,
            )
            .optional()?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        if entry.checksum_hash != current_checksum || entry.is_expired_at(now) {
            conn.execute(
                "DELETE FROM cache_entries WHERE query_hash = ?1",
                params![query_hash],
            )?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub fn set(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (query_hash, query, response, checksum_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.query_hash,
                entry.query,
                entry.response,
                entry.checksum_hash,
                entry.created_at,
                entry.expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, query_hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE query_hash = ?1",
            params![query_hash],
        )?;
        Ok(())
    }

    /// Drop every row computed against a different tree checksum.
    pub fn invalidate_by_checksum(&self, current_checksum: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM cache_entries WHERE checksum_hash != ?1",
            params![current_checksum],
        )?;
        Ok(deleted)
    }

    pub fn clean_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at < ?1",
            params![now],
        )?;
        Ok(deleted)
    }

    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT query_hash, query, response, checksum_hash, created_at, expires_at
             FROM cache_entries ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// (total rows, rows not yet expired).
    pub fn stats(&self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let total: usize =
            conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        let valid: usize = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok((total, valid))
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        query_hash: row.get(0)?,
        query: row.get(1)?,
        response: row.get(2)?,
        checksum_hash: row.get(3)?,
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::hash_query;
    use chrono::Duration;

    fn entry(query: &str, checksum: &str, ttl_hours: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            query_hash: hash_query(query),
            query: query.to_string(),
            response: format!("answer to {query}"),
            checksum_hash: checksum.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        }
    }

    #[test]
    fn set_then_get_with_matching_checksum() {
        let backend = DurableBackend::in_memory().unwrap();
        let e = entry("what is main?", "abc", 6);
        backend.set(&e).unwrap();

        let hit = backend.get(&e.query_hash, "abc", Utc::now()).unwrap();
        assert_eq!(hit.unwrap().response, e.response);
    }

    #[test]
    fn checksum_mismatch_deletes_and_misses() {
        let backend = DurableBackend::in_memory().unwrap();
        let e = entry("what is main?", "abc", 6);
        backend.set(&e).unwrap();

        assert!(backend.get(&e.query_hash, "def", Utc::now()).unwrap().is_none());
        // Entry was removed, so even the original checksum now misses.
        assert!(backend.get(&e.query_hash, "abc", Utc::now()).unwrap().is_none());
    }

    #[test]
    fn expired_entry_deletes_and_misses() {
        let backend = DurableBackend::in_memory().unwrap();
        let e = entry("q", "abc", -1);
        backend.set(&e).unwrap();

        assert!(backend.get(&e.query_hash, "abc", Utc::now()).unwrap().is_none());
        let (total, _) = backend.stats(Utc::now()).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn invalidate_by_checksum_keeps_current_rows() {
        let backend = DurableBackend::in_memory().unwrap();
        backend.set(&entry("q1", "old", 6)).unwrap();
        backend.set(&entry("q2", "current", 6)).unwrap();

        let deleted = backend.invalidate_by_checksum("current").unwrap();
        assert_eq!(deleted, 1);

        let remaining = backend.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].checksum_hash, "current");
    }

    #[test]
    fn clean_expired_removes_only_expired() {
        let backend = DurableBackend::in_memory().unwrap();
        backend.set(&entry("fresh", "c", 6)).unwrap();
        backend.set(&entry("stale", "c", -6)).unwrap();

        let deleted = backend.clean_expired(Utc::now()).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(backend.list().unwrap().len(), 1);
    }

    #[test]
    fn list_is_created_at_descending() {
        let backend = DurableBackend::in_memory().unwrap();
        let mut first = entry("first", "c", 6);
        first.created_at = Utc::now() - Duration::minutes(10);
        backend.set(&first).unwrap();
        backend.set(&entry("second", "c", 6)).unwrap();

        let entries = backend.list().unwrap();
        assert_eq!(entries[0].query, "second");
        assert_eq!(entries[1].query, "first");
    }
}
