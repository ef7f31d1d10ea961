use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::debug;

use crate::crypto::FileKey;
use crate::digest::ContentDigest;
use crate::error::{OffsiteError, Result};

/// One discovered file: identity, key custody, and upload status.
///
/// Records are append-only. The only mutation the index ever performs is
/// the `uploaded` flag's false→true flip.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size: u64,
    pub content_digest: ContentDigest,
    pub encryption_key: FileKey,
    pub uploaded: bool,
}

/// Totals reported by [`Index::summary`].
#[derive(Debug, Clone, Copy)]
pub struct IndexSummary {
    pub total: u64,
    pub pending: u64,
}

/// SQLite-backed ledger of discovered files and their upload status.
///
/// Sole source of truth for dedup and completion. The UNIQUE constraint on
/// `content_digest` is what actually guarantees at-most-one record per
/// distinct content; `exists_by_digest` is only a fast path.
pub struct Index {
    conn: Mutex<Connection>,
}

impl Index {
    /// Open (creating if absent) the index database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory index for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL,
                name            TEXT NOT NULL,
                size            INTEGER NOT NULL,
                content_digest  TEXT NOT NULL UNIQUE,
                encryption_key  BLOB NOT NULL,
                uploaded        INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_files_uploaded ON files(uploaded);",
        )?;
        Ok(())
    }

    /// Fast-path existence check for a content digest.
    pub fn exists_by_digest(&self, digest: &ContentDigest) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE content_digest = ?1 LIMIT 1)",
            params![digest.to_hex()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert a new record with `uploaded = false` and return its id.
    ///
    /// Fails with [`OffsiteError::DigestConflict`] if a record for this
    /// digest already exists. The constraint, not the caller's existence
    /// check, is what makes concurrent registration safe.
    pub fn register(
        &self,
        path: &str,
        name: &str,
        size: u64,
        digest: &ContentDigest,
        key: &FileKey,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO files (path, name, size, content_digest, encryption_key, uploaded)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![path, name, size as i64, digest.to_hex(), key.as_bytes().as_slice()],
        );
        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                debug!(id, path, digest = %digest, "registered file record");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(OffsiteError::DigestConflict(digest.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one record by id.
    pub fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, path, name, size, content_digest, encryption_key, uploaded
             FROM files WHERE id = ?1",
        )?;
        let row = stmt.query_row(params![id], Self::row_to_raw);
        match row {
            Ok(raw) => Ok(Some(Self::raw_to_record(raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of all records with `uploaded = false`, in insertion order.
    ///
    /// Materialized once at call time, not a live view. Re-invoke to pick
    /// up records registered afterwards.
    pub fn list_pending(&self) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, path, name, size, content_digest, encryption_key, uploaded
             FROM files WHERE uploaded = 0 ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::row_to_raw)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(Self::raw_to_record(row?)?);
        }
        Ok(records)
    }

    /// Idempotent flip to `uploaded = true`.
    ///
    /// Calling it again for an already-uploaded record is a no-op, which is
    /// what makes the upload stage safely retriable.
    pub fn mark_uploaded(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("UPDATE files SET uploaded = 1 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(OffsiteError::RecordNotFound(id));
        }
        Ok(())
    }

    /// Record and backlog counts.
    pub fn summary(&self) -> Result<IndexSummary> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let pending: i64 = conn.query_row(
            "SELECT COUNT(*) FROM files WHERE uploaded = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(IndexSummary {
            total: total as u64,
            pending: pending as u64,
        })
    }

    #[allow(clippy::type_complexity)]
    fn row_to_raw(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(i64, String, String, i64, String, Vec<u8>, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn raw_to_record(raw: (i64, String, String, i64, String, Vec<u8>, i64)) -> Result<FileRecord> {
        let (id, path, name, size, digest_hex, key_bytes, uploaded) = raw;
        Ok(FileRecord {
            id,
            path,
            name,
            size: size as u64,
            content_digest: ContentDigest::from_hex(&digest_hex)?,
            encryption_key: FileKey::from_bytes(&key_bytes)?,
            uploaded: uploaded != 0,
        })
    }
}
