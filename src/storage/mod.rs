//! Storage layer for Folio
//!
//! SQLite holds the note catalog and the transcript-chunk embedding store,
//! both sharing one connection pool.

pub mod chunks;
pub mod database;
pub mod notes;
pub mod vector;

use crate::config::StorageConfig;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use chunks::{ChunkMatch, ChunkStore, NewChunk, ReplaceOutcome, SqliteChunkStore, TranscriptChunk};
pub use database::{Database, DbPool, DbStats};
pub use notes::{Folder, NewNote, Note, NoteRepository, ProcessingStatus, UNFILED_FOLDER_ID};

/// Storage handles that share one database
pub struct Storage {
    pub database: Arc<Database>,
    pub notes: Arc<NoteRepository>,
    pub chunks: Arc<SqliteChunkStore>,
}

impl Storage {
    /// Open the database at `db_path` with the configured pool settings
    pub fn open(db_path: &Path, config: &StorageConfig) -> Result<Self> {
        let database = Arc::new(Database::open(
            db_path,
            config.pool_size,
            Duration::from_millis(config.timeout_ms),
        )?);

        Ok(Self::from_database(database))
    }

    pub fn from_database(database: Arc<Database>) -> Self {
        Self {
            notes: Arc::new(NoteRepository::new(database.clone())),
            chunks: Arc::new(SqliteChunkStore::new(database.clone())),
            database,
        }
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.database.stats()
    }
}
