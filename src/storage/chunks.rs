//! Transcript-chunk embedding store
//!
//! One logical collection: chunks of note transcripts with their vectors,
//! scoped by folder for retrieval. Nearest-neighbour ordering is done by SQLite
//! through the `cosine_distance` function registered on every connection.

use crate::error::{FolioError, Result};
use crate::storage::database::Database;
use crate::storage::vector::{decode_vector, encode_vector, first_non_finite};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

/// A persisted transcript chunk
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    pub id: i64,
    pub note_id: i64,
    pub folder_id: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chunk ready to be stored
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub note_id: i64,
    pub folder_id: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub model: String,
}

/// A nearest-neighbour hit with its distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub id: i64,
    pub note_id: i64,
    pub text: String,
    pub distance: f32,
}

/// Result of replacing a note's chunk set
#[derive(Debug, Clone)]
pub struct ReplaceOutcome {
    pub deleted: usize,
    pub inserted: Vec<TranscriptChunk>,
}

/// Store operations the pipelines depend on
pub trait ChunkStore: Send + Sync {
    /// Persist one chunk and return it with its id and timestamps
    fn insert(&self, chunk: NewChunk) -> Result<TranscriptChunk>;

    /// Delete every chunk of a note; returns the number of rows removed
    fn delete_by_note(&self, note_id: i64) -> Result<usize>;

    /// Texts of up to `k` chunks in `folder_id`, nearest first
    fn nearest_chunks(&self, folder_id: i64, query: &[f32], k: usize) -> Result<Vec<String>>;

    /// `nearest_chunks` restricted to vectors produced by `model`
    ///
    /// Stores that keep no model name fall back to `nearest_chunks`.
    fn nearest_chunks_for_model(
        &self,
        folder_id: i64,
        query: &[f32],
        model: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        let _ = model;
        self.nearest_chunks(folder_id, query, k)
    }

    /// Delete the note's chunks and insert `chunks` in one transaction
    fn replace_note_chunks(&self, note_id: i64, chunks: Vec<NewChunk>) -> Result<ReplaceOutcome>;
}

/// SQLite-backed chunk store
pub struct SqliteChunkStore {
    db: Arc<Database>,
}

impl SqliteChunkStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Nearest chunks with their distances
    ///
    /// Only chunks whose vector has the query's dimension are compared, and
    /// only those embedded by `model` when one is given. Equal distances are
    /// ordered by id.
    pub fn nearest_scored(
        &self,
        folder_id: i64,
        query: &[f32],
        model: Option<&str>,
        k: usize,
    ) -> Result<Vec<ChunkMatch>> {
        validate_folder_id(folder_id)?;
        if query.is_empty() {
            return Err(FolioError::Validation(
                "query vector must not be empty".to_string(),
            ));
        }
        if let Some(index) = first_non_finite(query) {
            return Err(FolioError::Validation(format!(
                "query vector component {} is not a finite number",
                index
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, note_id, transcript_chunk, cosine_distance(embedding, ?2) AS distance
             FROM note_transcript_embeddings
             WHERE folder_id = ?1 AND dimension = ?3 AND (?5 IS NULL OR model = ?5)
             ORDER BY distance ASC, id ASC
             LIMIT ?4",
        )?;

        let rows = stmt.query_map(
            params![
                folder_id,
                encode_vector(query),
                query.len() as i64,
                k.min(i64::MAX as usize) as i64,
                model
            ],
            |row| {
                let distance: f64 = row.get(3)?;
                Ok(ChunkMatch {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    text: row.get(2)?,
                    distance: distance as f32,
                })
            },
        )?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(row?);
        }

        tracing::debug!(
            "Nearest-chunk query in folder {} returned {} of at most {}",
            folder_id,
            matches.len(),
            k
        );

        Ok(matches)
    }

    /// All chunks of a note, in insertion order
    pub fn list_by_note(&self, note_id: i64) -> Result<Vec<TranscriptChunk>> {
        validate_note_id(note_id)?;

        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, note_id, folder_id, transcript_chunk, embedding, model, created_at, updated_at
             FROM note_transcript_embeddings
             WHERE note_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![note_id], chunk_from_row)?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    /// Point a note's chunks at another folder; returns the number of rows moved
    pub fn reassign_folder(&self, note_id: i64, folder_id: i64) -> Result<usize> {
        validate_note_id(note_id)?;
        validate_folder_id(folder_id)?;

        let conn = self.db.get_conn()?;
        let moved = conn.execute(
            "UPDATE note_transcript_embeddings
             SET folder_id = ?2, updated_at = ?3
             WHERE note_id = ?1",
            params![note_id, folder_id, Utc::now()],
        )?;

        tracing::debug!(
            "Moved {} chunks of note {} to folder {}",
            moved,
            note_id,
            folder_id
        );
        Ok(moved)
    }

    /// Total number of stored chunks
    pub fn count(&self) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM note_transcript_embeddings",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of chunks scoped to a folder
    pub fn count_for_folder(&self, folder_id: i64) -> Result<usize> {
        validate_folder_id(folder_id)?;

        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM note_transcript_embeddings WHERE folder_id = ?1",
            params![folder_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl ChunkStore for SqliteChunkStore {
    fn insert(&self, chunk: NewChunk) -> Result<TranscriptChunk> {
        validate_new_chunk(&chunk)?;

        let conn = self.db.get_conn()?;
        insert_chunk(&conn, chunk)
    }

    fn delete_by_note(&self, note_id: i64) -> Result<usize> {
        validate_note_id(note_id)?;

        let conn = self.db.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM note_transcript_embeddings WHERE note_id = ?1",
            params![note_id],
        )?;

        tracing::debug!("Deleted {} chunks of note {}", deleted, note_id);
        Ok(deleted)
    }

    fn nearest_chunks(&self, folder_id: i64, query: &[f32], k: usize) -> Result<Vec<String>> {
        Ok(self
            .nearest_scored(folder_id, query, None, k)?
            .into_iter()
            .map(|m| m.text)
            .collect())
    }

    fn nearest_chunks_for_model(
        &self,
        folder_id: i64,
        query: &[f32],
        model: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        Ok(self
            .nearest_scored(folder_id, query, Some(model), k)?
            .into_iter()
            .map(|m| m.text)
            .collect())
    }

    fn replace_note_chunks(&self, note_id: i64, chunks: Vec<NewChunk>) -> Result<ReplaceOutcome> {
        validate_note_id(note_id)?;
        for chunk in &chunks {
            validate_new_chunk(chunk)?;
            if chunk.note_id != note_id {
                return Err(FolioError::Validation(format!(
                    "chunk for note {} cannot replace chunks of note {}",
                    chunk.note_id, note_id
                )));
            }
        }

        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;

        let deleted = tx.execute(
            "DELETE FROM note_transcript_embeddings WHERE note_id = ?1",
            params![note_id],
        )?;

        let mut inserted = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            inserted.push(insert_chunk(&tx, chunk)?);
        }

        // Dropping the transaction on any error above rolls it back
        tx.commit()?;

        tracing::debug!(
            "Replaced {} chunks of note {} with {}",
            deleted,
            note_id,
            inserted.len()
        );

        Ok(ReplaceOutcome { deleted, inserted })
    }
}

fn insert_chunk(conn: &Connection, chunk: NewChunk) -> Result<TranscriptChunk> {
    let now = Utc::now();

    conn.execute(
        "INSERT INTO note_transcript_embeddings
         (note_id, folder_id, transcript_chunk, embedding, dimension, model, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            chunk.note_id,
            chunk.folder_id,
            chunk.text,
            encode_vector(&chunk.embedding),
            chunk.embedding.len() as i64,
            chunk.model,
            now
        ],
    )?;

    Ok(TranscriptChunk {
        id: conn.last_insert_rowid(),
        note_id: chunk.note_id,
        folder_id: chunk.folder_id,
        text: chunk.text,
        embedding: chunk.embedding,
        model: chunk.model,
        created_at: now,
        updated_at: now,
    })
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<TranscriptChunk> {
    let blob: Vec<u8> = row.get(4)?;
    let embedding = decode_vector(&blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Blob, Box::new(e))
    })?;

    Ok(TranscriptChunk {
        id: row.get(0)?,
        note_id: row.get(1)?,
        folder_id: row.get(2)?,
        text: row.get(3)?,
        embedding,
        model: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn validate_note_id(note_id: i64) -> Result<()> {
    if note_id < 1 {
        return Err(FolioError::Validation(format!(
            "note id must be positive, got {}",
            note_id
        )));
    }
    Ok(())
}

fn validate_folder_id(folder_id: i64) -> Result<()> {
    if folder_id < 0 {
        return Err(FolioError::Validation(format!(
            "folder id must not be negative, got {}",
            folder_id
        )));
    }
    Ok(())
}

fn validate_new_chunk(chunk: &NewChunk) -> Result<()> {
    validate_note_id(chunk.note_id)?;
    validate_folder_id(chunk.folder_id)?;

    if chunk.text.trim().is_empty() {
        return Err(FolioError::Validation(format!(
            "chunk text for note {} is blank",
            chunk.note_id
        )));
    }
    if chunk.embedding.is_empty() {
        return Err(FolioError::Validation(format!(
            "chunk embedding for note {} is empty",
            chunk.note_id
        )));
    }
    if let Some(index) = first_non_finite(&chunk.embedding) {
        return Err(FolioError::Validation(format!(
            "chunk embedding for note {} has a non-finite component at {}",
            chunk.note_id, index
        )));
    }
    Ok(())
}
