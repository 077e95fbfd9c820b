use crate::cache::{CacheStore, GALLERY_SNAPSHOT_KEY};
use crate::error::{Result, ScanError};
use crate::types::{GallerySnapshot, ImageRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed gallery cache. One connection, serialized behind a mutex.
pub struct Db {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScanError::Storage(format!("Could not create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                written_at TEXT NOT NULL
            );
            ",
        )?;
        conn.execute(
            "INSERT INTO schema_version (version) SELECT ?1
             WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1)",
            params![SCHEMA_VERSION],
        )?;
        debug!(path = %db_path.display(), "cache database opened");

        Ok(Db {
            conn: Mutex::new(conn),
            path: db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ScanError::Storage(format!("cache connection poisoned: {}", e)))
    }
}

impl CacheStore for Db {
    fn read_all(&self) -> Result<Option<GallerySnapshot>> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, fetched_at FROM cache_entries WHERE key = ?1",
                params![GALLERY_SNAPSHOT_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((payload, fetched_at)) = row else {
            return Ok(None);
        };
        let records: Vec<ImageRecord> = serde_json::from_str(&payload)
            .map_err(|e| ScanError::Storage(format!("Corrupt cached snapshot: {}", e)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
            .map_err(|e| ScanError::Storage(format!("Corrupt snapshot timestamp: {}", e)))?
            .with_timezone(&Utc);
        Ok(Some(GallerySnapshot::new(records, fetched_at)))
    }

    fn write_all(&self, snapshot: &GallerySnapshot) -> Result<()> {
        let payload = serde_json::to_string(&*snapshot.records)
            .map_err(|e| ScanError::Storage(format!("Serialize snapshot: {}", e)))?;
        let fetched_at = snapshot.fetched_at.unwrap_or_else(Utc::now).to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO cache_entries (key, payload, fetched_at, written_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![GALLERY_SNAPSHOT_KEY, payload, fetched_at, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(count = snapshot.len(), "gallery snapshot persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }
}
