//! TTL-bounded artifact cache backed by SQLite.
//!
//! Entries are keyed by [`CacheKey`], the SHA-256 of the repository URL, and
//! live in a single `cache` table:
//!
//! | column        | meaning                                   |
//! |---------------|-------------------------------------------|
//! | `cache_key`   | hex digest, unique, indexed               |
//! | `repo_url`    | repository identity, for bulk invalidation|
//! | `result_data` | serialized [`Artifact`] (JSON)            |
//! | `created_at`  | unix micros                               |
//! | `expires_at`  | unix micros, always `> created_at`        |
//!
//! Every operation takes the current time explicitly, so expiry is decided by
//! the caller's clock and is deterministic under test. A read at `now` only
//! sees rows with `expires_at > now`; expired rows stay on disk until
//! [`SqliteArtifactCache::sweep_expired`] runs.
//!
//! Writes never fail the caller: [`ArtifactCache::put`] logs and swallows
//! storage errors so a persistence fault cannot fail a finished generation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::contract::ArtifactCache;
use crate::model::Artifact;

/// Deterministic cache key for a repository identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_repository(repo_url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repo_url.as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("cannot create cache directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cached artifact could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("ttl must be positive and representable, got {0}")]
    InvalidTtl(Duration),
}

fn db_err(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> CacheError {
    move |source| CacheError::Database { operation, source }
}

/// Which entries [`ArtifactCache::invalidate`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Repository(String),
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub size_bytes: u64,
}

impl CacheStats {
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// SQLite implementation of [`ArtifactCache`].
pub struct SqliteArtifactCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteArtifactCache {
    /// Opens (creating if needed) the cache database at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(&db_path).map_err(db_err("open"))?;
        let cache = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        cache.initialize()?;
        info!(db_path = %cache.db_path.display(), "Cache database initialized");
        Ok(cache)
    }

    /// In-memory cache, used by tests and one-shot runs.
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(db_err("open_in_memory"))?;
        let cache = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        cache.initialize()?;
        Ok(cache)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Closes the underlying connection, reporting any error SQLite raises on close.
    pub fn close(self) -> Result<(), CacheError> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, source)| CacheError::Database {
            operation: "close",
            source,
        })?;
        debug!(db_path = %self.db_path.display(), "Cache database closed");
        Ok(())
    }

    fn initialize(&self) -> Result<(), CacheError> {
        let conn = self.lock();
        if self.db_path.as_os_str() != ":memory:" {
            for (pragma, value) in [("journal_mode", "WAL"), ("busy_timeout", "5000")] {
                if let Err(e) = conn.pragma_update(None, pragma, value) {
                    warn!(pragma, value, error = %e, "Failed to apply cache database pragma");
                }
            }
        }
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cache_key TEXT UNIQUE NOT NULL,
                repo_url TEXT NOT NULL,
                result_data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(db_err("create_cache_table"))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_key ON cache (cache_key)",
            [],
        )
        .map_err(db_err("create_cache_index"))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Cache connection mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Fallible form of [`ArtifactCache::put`].
    pub fn try_put(
        &self,
        key: &CacheKey,
        repo_url: &str,
        artifact: &Artifact,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        // Timestamps are stored in micros; anything shorter collapses expiry onto creation.
        if ttl < Duration::microseconds(1) {
            return Err(CacheError::InvalidTtl(ttl));
        }
        let expires = now
            .checked_add_signed(ttl)
            .ok_or(CacheError::InvalidTtl(ttl))?;
        let payload = serde_json::to_string(artifact)?;
        let created_at = now.timestamp_micros();
        let expires_at = expires.timestamp_micros();

        self.lock()
            .execute(
                "INSERT OR REPLACE INTO cache (cache_key, repo_url, result_data, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key.as_str(), repo_url, payload, created_at, expires_at],
            )
            .map_err(db_err("put"))?;
        Ok(())
    }
}

impl ArtifactCache for SqliteArtifactCache {
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<Artifact>, CacheError> {
        let row: Option<String> = self
            .lock()
            .query_row(
                "SELECT result_data FROM cache WHERE cache_key = ?1 AND expires_at > ?2",
                params![key.as_str(), now.timestamp_micros()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("get"))?;

        match row {
            Some(payload) => {
                debug!(cache_key = %key, "Cache hit");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => {
                debug!(cache_key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    fn put(
        &self,
        key: &CacheKey,
        repo_url: &str,
        artifact: &Artifact,
        now: DateTime<Utc>,
        ttl: Duration,
    ) {
        match self.try_put(key, repo_url, artifact, now, ttl) {
            Ok(()) => info!(cache_key = %key, repo_url, "Artifact cached"),
            Err(e) => error!(cache_key = %key, repo_url, error = %e, "Failed to cache artifact"),
        }
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let deleted = self
            .lock()
            .execute(
                "DELETE FROM cache WHERE expires_at < ?1",
                params![now.timestamp_micros()],
            )
            .map_err(db_err("sweep_expired"))?;
        if deleted > 0 {
            info!(deleted, "Swept expired cache entries");
        }
        Ok(deleted)
    }

    fn invalidate(&self, scope: &Invalidation) -> Result<usize, CacheError> {
        let conn = self.lock();
        let deleted = match scope {
            Invalidation::Repository(repo_url) => conn
                .execute("DELETE FROM cache WHERE repo_url = ?1", params![repo_url])
                .map_err(db_err("invalidate_repository"))?,
            Invalidation::All => conn
                .execute("DELETE FROM cache", [])
                .map_err(db_err("invalidate_all"))?,
        };
        info!(?scope, deleted, "Invalidated cache entries");
        Ok(deleted)
    }

    fn stats(&self, now: DateTime<Utc>) -> Result<CacheStats, CacheError> {
        let (total, active, size_bytes): (i64, i64, i64) = self
            .lock()
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN expires_at > ?1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(LENGTH(CAST(result_data AS BLOB))), 0)
                 FROM cache",
                params![now.timestamp_micros()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err("stats"))?;

        let total = total.max(0) as u64;
        let active = active.max(0) as u64;
        Ok(CacheStats {
            total,
            active,
            expired: total - active,
            size_bytes: size_bytes.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_is_opened_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteArtifactCache::open(dir.path().join("cache.db")).unwrap();

        let conn = cache.lock();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(timeout, 5000);
    }
}
