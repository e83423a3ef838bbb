use crate::config::DatabaseConfig;
use crate::errors::{RenderError, Result};
use crate::models::CacheEntry;
use crate::pipeline::graph::CANONICAL_FORMAT;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Pool, Row, Sqlite};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the canonical artifact inside each per-key subdirectory.
const ARTIFACT_STEM: &str = "result";

/// Persistent mapping from cache key to stored artifact.
///
/// Explicitly constructed and passed by reference to the orchestrator;
/// schema setup happens once via [`CacheIndex::migrate`] at startup.
#[derive(Clone)]
pub struct CacheIndex {
    pool: Pool<Sqlite>,
    cache_root: PathBuf,
}

impl CacheIndex {
    pub async fn new(config: &DatabaseConfig, cache_root: impl Into<PathBuf>) -> Result<Self> {
        // Create database if it doesn't exist (for SQLite); in-memory
        // databases spring into existence on connect
        if !config.url.contains(":memory:")
            && !Sqlite::database_exists(&config.url).await.unwrap_or(false)
        {
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(10))
            .connect(&config.url)
            .await?;

        // WAL keeps the index durable under concurrent readers and a writer
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            cache_root: cache_root.into(),
        })
    }

    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Run schema migration. Called once at startup, before any lookup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                id          TEXT PRIMARY KEY,
                image_hash  TEXT NOT NULL,
                low_quality INTEGER NOT NULL,
                file_path   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                hit_count   INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a key to the absolute path of its stored artifact.
    ///
    /// A row whose backing file has vanished is the stale-entry condition:
    /// the row is deleted and the lookup reports a miss. The hit counter is
    /// only incremented after the file is confirmed present, so no increment
    /// is ever observable for a stale row.
    pub async fn lookup(&self, key: &str) -> Result<Option<PathBuf>> {
        let row = sqlx::query("SELECT file_path FROM cache_entries WHERE id = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let relative: String = row.get("file_path");
        let absolute = self.cache_root.join(&relative);

        if !fs::try_exists(&absolute).await.unwrap_or(false) {
            self.remove_stale(key).await?;
            info!("stale cache entry removed: {}", key);
            return Ok(None);
        }

        sqlx::query("UPDATE cache_entries SET hit_count = hit_count + 1 WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!("cache hit: {}", key);
        Ok(Some(absolute))
    }

    /// Move a freshly rendered artifact into permanent cache storage and
    /// record its row. Returns the stored absolute path.
    ///
    /// The row is written with `hit_count = 0`; inserts never count as hits.
    /// `INSERT OR REPLACE` is defensive — a given key is expected to be
    /// written at most once in normal operation.
    pub async fn insert(
        &self,
        key: &str,
        image_hash: &str,
        low_quality: bool,
        source_path: &Path,
    ) -> Result<PathBuf> {
        let entry_dir = self.cache_root.join(key);
        fs::create_dir_all(&entry_dir).await?;

        let file_name = format!("{}.{}", ARTIFACT_STEM, CANONICAL_FORMAT.extension());
        let dest_path = entry_dir.join(&file_name);
        fs::copy(source_path, &dest_path).await?;

        let relative_path = format!("{key}/{file_name}");

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_entries (id, image_hash, low_quality, file_path, created_at, hit_count)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(key)
        .bind(image_hash)
        .bind(low_quality)
        .bind(&relative_path)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("cache saved: {}", key);
        Ok(dest_path)
    }

    /// Delete a row whose backing file was found missing.
    pub async fn remove_stale(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE id = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete by stored relative path, for readers that never resolved a key.
    pub async fn remove_by_path(&self, relative_path: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE file_path = ?")
            .bind(relative_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Pick one cached artifact uniformly at random.
    ///
    /// Self-heals like `lookup` but does not retry after healing and does
    /// not touch hit counters.
    pub async fn random(&self) -> Result<Option<PathBuf>> {
        let row = sqlx::query("SELECT file_path FROM cache_entries ORDER BY RANDOM() LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let relative: String = row.get("file_path");
        let absolute = self.cache_root.join(&relative);

        if !fs::try_exists(&absolute).await.unwrap_or(false) {
            self.remove_by_path(&relative).await?;
            info!("stale cache entry removed: {}", relative);
            return Ok(None);
        }

        Ok(Some(absolute))
    }

    /// Fetch a full row, mainly for inspection and tests.
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT id, image_hash, low_quality, file_path, created_at, hit_count
             FROM cache_entries WHERE id = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let created_at: String = row.get("created_at");
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| RenderError::Index(sqlx::Error::Decode(Box::new(e))))?
                    .with_timezone(&Utc);
                Ok(Some(CacheEntry {
                    id: row.get("id"),
                    image_hash: row.get("image_hash"),
                    low_quality: row.get("low_quality"),
                    file_path: row.get("file_path"),
                    created_at,
                    hit_count: row.get("hit_count"),
                }))
            }
            None => Ok(None),
        }
    }

    /// Number of entries currently indexed.
    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
