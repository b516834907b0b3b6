//! SQLite database management with migrations
//!
//! Provides the connection pool shared by the note catalog and the
//! transcript-chunk store.

use crate::error::{FolioError, Result};
use crate::storage::vector;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::time::Duration;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Default pool size
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Default bound for a single store call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) a database with default pool settings
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::open(db_path, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT)
    }

    /// Open (or create) a database
    ///
    /// `timeout` bounds both pool checkout and SQLite lock waits, so a store
    /// call fails instead of blocking a pipeline indefinitely.
    pub fn open(db_path: &Path, pool_size: u32, timeout: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FolioError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
            conn.execute_batch(
                "
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                ",
            )?;
            conn.busy_timeout(timeout)?;
            vector::register_functions(conn)
        });

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(timeout)
            .build(manager)
            .map_err(|e| FolioError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool.get()?;
            // WAL is persistent, setting it once per database file is enough
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let applied: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (index, migration) in MIGRATIONS.iter().enumerate() {
            let version = index as i64 + 1;
            if version <= applied {
                continue;
            }

            tracing::info!("Applying schema migration {}", version);
            // Schema and version row commit together
            let tx = conn.transaction()?;
            tx.execute_batch(migration)?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now()],
            )?;
            tx.commit()?;
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let folder_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;

        let note_count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;

        let chunk_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM note_transcript_embeddings",
            [],
            |row| row.get(0),
        )?;

        let embedded_note_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT note_id) FROM note_transcript_embeddings",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            folder_count: folder_count as usize,
            note_count: note_count as usize,
            chunk_count: chunk_count as usize,
            embedded_note_count: embedded_note_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub folder_count: usize,
    pub note_count: usize,
    pub chunk_count: usize,
    pub embedded_note_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL DEFAULT 0,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX idx_folders_user ON folders(user_id);

    CREATE TABLE notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        folder_id INTEGER,
        title TEXT NOT NULL,
        transcript TEXT,
        summary TEXT,
        processing_status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE SET NULL
    );

    CREATE INDEX idx_notes_folder ON notes(folder_id);

    -- One row per transcript chunk; folder_id is copied from the note at ingestion
    CREATE TABLE note_transcript_embeddings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        note_id INTEGER NOT NULL,
        folder_id INTEGER NOT NULL,
        transcript_chunk TEXT NOT NULL CHECK (length(trim(transcript_chunk)) > 0),
        embedding BLOB NOT NULL,
        dimension INTEGER NOT NULL,
        model TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_nte_note ON note_transcript_embeddings(note_id);
    CREATE INDEX idx_nte_folder_dimension ON note_transcript_embeddings(folder_id, dimension);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).unwrap();

        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();

        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_reopen_does_not_reapply_migrations() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        drop(Database::new(&db_path).unwrap());
        let db = Database::new(&db_path).unwrap();

        let conn = db.get_conn().unwrap();
        let applied: i32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_schema_exists() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).unwrap();
        let conn = db.get_conn().unwrap();

        for table in ["folders", "notes", "note_transcript_embeddings"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();

            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_connection_init() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
        let conn = db.get_conn().unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);

        let distance: f64 = conn
            .query_row(
                "SELECT cosine_distance(?1, ?1)",
                params![vector::encode_vector(&[0.3, 0.4])],
                |row| row.get(0),
            )
            .unwrap();
        assert!(distance.abs() < 1e-6);
    }

    #[test]
    fn test_empty_stats() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.folder_count, 0);
        assert_eq!(stats.note_count, 0);
        assert_eq!(stats.chunk_count, 0);
    }
}
