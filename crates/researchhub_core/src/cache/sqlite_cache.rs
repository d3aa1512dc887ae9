//! SQLite-backed cache with absolute expiry timestamps.

use super::{Cache, CacheResult};
use crate::clock::{duration_ms, Clock};
use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteCache<'conn> {
    name: String,
    conn: &'conn Connection,
    clock: Arc<dyn Clock>,
}

impl<'conn> SqliteCache<'conn> {
    /// Constructs a cache from a migrated connection and a time source.
    pub fn try_new(
        name: impl Into<String>,
        conn: &'conn Connection,
        clock: Arc<dyn Clock>,
    ) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["cache_entries"])?;
        Ok(Self {
            name: name.into(),
            conn,
            clock,
        })
    }

    /// Deletes expired rows and returns how many were removed.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1;",
            [self.clock.now_ms()],
        )?;
        Ok(removed)
    }
}

impl Cache for SqliteCache<'_> {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2;",
                params![key, self.clock.now_ms()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expires_at = self.clock.now_ms().saturating_add(duration_ms(ttl));
        self.conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at;",
            params![key, value, expires_at],
        )?;
        Ok(())
    }
}
