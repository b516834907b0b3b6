//! Note catalog
//!
//! Folders and notes the pipelines validate against, plus the processing
//! status that makes background ingestion observable.

use crate::error::{FolioError, Result};
use crate::storage::database::Database;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Folder id recorded on chunks of notes that are not in any folder
pub const UNFILED_FOLDER_ID: i64 = 0;

/// Ingestion state of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Created, not yet ingested
    Pending,
    /// Ingestion queued or running
    Processing,
    /// Last ingestion succeeded
    Done,
    /// Last ingestion failed
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(FolioError::Validation(format!(
                "unknown processing status '{}'",
                other
            ))),
        }
    }
}

impl ToSql for ProcessingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProcessingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: FolioError| FromSqlError::Other(Box::new(e)))
    }
}

/// A folder grouping notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A voice note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub folder_id: Option<i64>,
    pub title: String,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Folder id to record on this note's chunks
    pub fn chunk_folder_id(&self) -> i64 {
        self.folder_id.unwrap_or(UNFILED_FOLDER_ID)
    }
}

/// Fields needed to create a note
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub folder_id: Option<i64>,
}

/// Folder and note persistence
pub struct NoteRepository {
    db: Arc<Database>,
}

impl NoteRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create_folder(&self, name: &str, user_id: i64) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FolioError::Validation(
                "folder name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO folders (user_id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![user_id, name, now],
        )?;

        let folder = Folder {
            id: conn.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tracing::info!("Created folder {} ({})", folder.id, folder.name);
        Ok(folder)
    }

    pub fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        positive_id("folder", id)?;

        let conn = self.db.get_conn()?;
        let folder = conn
            .query_row(
                "SELECT id, user_id, name, created_at, updated_at FROM folders WHERE id = ?1",
                params![id],
                folder_from_row,
            )
            .optional()?;
        Ok(folder)
    }

    /// Like `get_folder`, but a missing folder is `NotFound`
    pub fn require_folder(&self, id: i64) -> Result<Folder> {
        self.get_folder(id)?
            .ok_or_else(|| FolioError::not_found("folder", id))
    }

    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, created_at, updated_at FROM folders ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], folder_from_row)?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row?);
        }
        Ok(folders)
    }

    pub fn create_note(&self, new_note: NewNote) -> Result<Note> {
        if new_note.title.trim().is_empty() {
            return Err(FolioError::Validation(
                "note title must not be empty".to_string(),
            ));
        }
        if let Some(folder_id) = new_note.folder_id {
            self.require_folder(folder_id)?;
        }

        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO notes (folder_id, title, processing_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                new_note.folder_id,
                new_note.title,
                ProcessingStatus::Pending,
                now
            ],
        )?;

        let note = Note {
            id: conn.last_insert_rowid(),
            folder_id: new_note.folder_id,
            title: new_note.title,
            transcript: None,
            summary: None,
            processing_status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tracing::info!("Created note {} in folder {:?}", note.id, note.folder_id);
        Ok(note)
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        positive_id("note", id)?;

        let conn = self.db.get_conn()?;
        let note = conn
            .query_row(
                "SELECT id, folder_id, title, transcript, summary, processing_status, created_at, updated_at
                 FROM notes WHERE id = ?1",
                params![id],
                note_from_row,
            )
            .optional()?;
        Ok(note)
    }

    /// Like `get_note`, but a missing note is `NotFound`
    pub fn require_note(&self, id: i64) -> Result<Note> {
        self.get_note(id)?
            .ok_or_else(|| FolioError::not_found("note", id))
    }

    /// Notes in a folder (`None` lists unfiled notes)
    pub fn list_notes(&self, folder_id: Option<i64>) -> Result<Vec<Note>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, folder_id, title, transcript, summary, processing_status, created_at, updated_at
             FROM notes WHERE folder_id IS ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![folder_id], note_from_row)?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }

    pub fn update_transcript(
        &self,
        note_id: i64,
        transcript: &str,
        summary: Option<&str>,
    ) -> Result<()> {
        positive_id("note", note_id)?;

        let conn = self.db.get_conn()?;
        let updated = conn.execute(
            "UPDATE notes SET transcript = ?2, summary = ?3, updated_at = ?4 WHERE id = ?1",
            params![note_id, transcript, summary, Utc::now()],
        )?;
        if updated == 0 {
            return Err(FolioError::not_found("note", note_id));
        }
        Ok(())
    }

    pub fn set_processing_status(&self, note_id: i64, status: ProcessingStatus) -> Result<()> {
        positive_id("note", note_id)?;

        let conn = self.db.get_conn()?;
        let updated = conn.execute(
            "UPDATE notes SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
            params![note_id, status, Utc::now()],
        )?;
        if updated == 0 {
            return Err(FolioError::not_found("note", note_id));
        }

        tracing::debug!("Note {} is now {}", note_id, status);
        Ok(())
    }

    /// Move a note to a folder (`None` unfiles it)
    pub fn move_note(&self, note_id: i64, folder_id: Option<i64>) -> Result<Note> {
        let mut note = self.require_note(note_id)?;
        if let Some(folder_id) = folder_id {
            self.require_folder(folder_id)?;
        }

        let now = Utc::now();
        let conn = self.db.get_conn()?;
        conn.execute(
            "UPDATE notes SET folder_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![note_id, folder_id, now],
        )?;

        note.folder_id = folder_id;
        note.updated_at = now;
        Ok(note)
    }

    /// Delete a note; returns false when it did not exist
    pub fn delete_note(&self, note_id: i64) -> Result<bool> {
        positive_id("note", note_id)?;

        let conn = self.db.get_conn()?;
        let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", params![note_id])?;
        Ok(deleted > 0)
    }
}

fn positive_id(entity: &str, id: i64) -> Result<()> {
    if id < 1 {
        return Err(FolioError::Validation(format!(
            "{} id must be positive, got {}",
            entity, id
        )));
    }
    Ok(())
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        folder_id: row.get(1)?,
        title: row.get(2)?,
        transcript: row.get(3)?,
        summary: row.get(4)?,
        processing_status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, NoteRepository) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::new(&temp_dir.path().join("test.db")).unwrap());
        (temp_dir, NoteRepository::new(db))
    }

    #[test]
    fn test_folder_lifecycle() {
        let (_tmp, repo) = setup();

        let work = repo.create_folder("Work", 1).unwrap();
        let home = repo.create_folder("  Home ", 1).unwrap();
        assert_eq!(home.name, "Home");

        assert_eq!(repo.require_folder(work.id).unwrap(), work);
        assert!(repo.get_folder(999).unwrap().is_none());
        assert!(matches!(
            repo.require_folder(999),
            Err(FolioError::NotFound { entity: "folder", id: 999 })
        ));
        assert_eq!(repo.list_folders().unwrap().len(), 2);
        assert!(repo.create_folder(" ", 1).unwrap_err().is_validation());
    }

    #[test]
    fn test_note_lifecycle() {
        let (_tmp, repo) = setup();
        let folder = repo.create_folder("Work", 1).unwrap();

        let note = repo
            .create_note(NewNote {
                title: "Standup".to_string(),
                folder_id: Some(folder.id),
            })
            .unwrap();
        assert_eq!(note.processing_status, ProcessingStatus::Pending);
        assert_eq!(note.chunk_folder_id(), folder.id);

        repo.update_transcript(note.id, "we shipped it", Some("shipping"))
            .unwrap();
        repo.set_processing_status(note.id, ProcessingStatus::Done)
            .unwrap();

        let loaded = repo.require_note(note.id).unwrap();
        assert_eq!(loaded.transcript.as_deref(), Some("we shipped it"));
        assert_eq!(loaded.summary.as_deref(), Some("shipping"));
        assert_eq!(loaded.processing_status, ProcessingStatus::Done);

        assert_eq!(repo.list_notes(Some(folder.id)).unwrap().len(), 1);
        assert!(repo.list_notes(None).unwrap().is_empty());

        assert!(repo.delete_note(note.id).unwrap());
        assert!(!repo.delete_note(note.id).unwrap());
        assert!(repo.get_note(note.id).unwrap().is_none());
    }

    #[test]
    fn test_unfiled_note_uses_folder_zero() {
        let (_tmp, repo) = setup();
        let note = repo
            .create_note(NewNote {
                title: "Loose".to_string(),
                folder_id: None,
            })
            .unwrap();
        assert_eq!(note.chunk_folder_id(), UNFILED_FOLDER_ID);
        assert_eq!(repo.list_notes(None).unwrap().len(), 1);
    }

    #[test]
    fn test_create_note_in_missing_folder() {
        let (_tmp, repo) = setup();
        let result = repo.create_note(NewNote {
            title: "Lost".to_string(),
            folder_id: Some(12),
        });
        assert!(matches!(result, Err(FolioError::NotFound { .. })));
    }

    #[test]
    fn test_move_note() {
        let (_tmp, repo) = setup();
        let a = repo.create_folder("A", 1).unwrap();
        let b = repo.create_folder("B", 1).unwrap();
        let note = repo
            .create_note(NewNote {
                title: "Roaming".to_string(),
                folder_id: Some(a.id),
            })
            .unwrap();

        let moved = repo.move_note(note.id, Some(b.id)).unwrap();
        assert_eq!(moved.folder_id, Some(b.id));
        assert_eq!(repo.require_note(note.id).unwrap().folder_id, Some(b.id));

        assert!(matches!(
            repo.move_note(note.id, Some(404)),
            Err(FolioError::NotFound { .. })
        ));
    }

    #[test]
    fn test_missing_note_updates() {
        let (_tmp, repo) = setup();
        assert!(matches!(
            repo.set_processing_status(5, ProcessingStatus::Failed),
            Err(FolioError::NotFound { entity: "note", id: 5 })
        ));
        assert!(repo.update_transcript(0, "x", None).unwrap_err().is_validation());
    }

    #[test]
    fn test_status_parsing() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Done,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
        assert!("queued".parse::<ProcessingStatus>().is_err());
    }
}
