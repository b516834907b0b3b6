//! Note service
//!
//! Holds the storage handles, the provider capabilities and both pipelines,
//! and checks that referenced notes and folders exist before any pipeline
//! work starts.

use crate::completion::{build_completer, CompletionService};
use crate::config::Config;
use crate::embedding::{build_embedder, EmbeddingProvider};
use crate::error::{FolioError, Result};
use crate::ingest::{run_tracked, IngestJob, IngestQueue, IngestReport, IngestionPipeline};
use crate::retrieval::{GroundedAnswer, QueryPipeline};
use crate::storage::{
    ChunkMatch, ChunkStore, Note, NoteRepository, SqliteChunkStore, Storage, UNFILED_FOLDER_ID,
};
use std::path::Path;
use std::sync::Arc;

/// Capability-holding context for ingestion and questions
pub struct NoteService {
    storage: Storage,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionService>,
    ingestion: Arc<IngestionPipeline>,
    query: QueryPipeline,
    queue_capacity: usize,
}

impl NoteService {
    /// Wire a service from explicit parts
    pub fn new(
        storage: Storage,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionService>,
        config: &Config,
    ) -> Result<Self> {
        let store: Arc<dyn ChunkStore> = storage.chunks.clone();
        let ingestion = IngestionPipeline::new(store.clone(), config.chunking.policy()?)
            .with_atomic(config.ingestion.atomic);
        let query = QueryPipeline::new(store).with_top_k(config.retrieval.top_k);

        Ok(Self {
            storage,
            embedder,
            completer,
            ingestion: Arc::new(ingestion),
            query,
            queue_capacity: config.ingestion.queue_capacity,
        })
    }

    /// Open the database and build the configured providers
    pub fn from_config(config: &Config, db_path: &Path) -> Result<Self> {
        let storage = Storage::open(db_path, &config.storage)?;
        let embedder = build_embedder(&config.embedding)?;
        let completer = build_completer(&config.llm)?;
        Self::new(storage, embedder, completer, config)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn notes(&self) -> &NoteRepository {
        &self.storage.notes
    }

    pub fn chunks(&self) -> &SqliteChunkStore {
        &self.storage.chunks
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Ingest the transcript already stored on a note
    pub fn ingest_note(&self, note_id: i64) -> Result<IngestReport> {
        let job = self.prepare_job(note_id)?;
        self.run(&job)
    }

    /// Store a transcript (and optional summary) on a note, then ingest it
    pub fn ingest_transcript(
        &self,
        note_id: i64,
        transcript: &str,
        summary: Option<&str>,
    ) -> Result<IngestReport> {
        let note = self.storage.notes.require_note(note_id)?;
        self.storage
            .notes
            .update_transcript(note_id, transcript, summary)?;

        self.run(&IngestJob {
            note_id,
            folder_id: note.chunk_folder_id(),
            transcript: transcript.to_string(),
        })
    }

    /// Validate a note and build its background ingestion job
    ///
    /// Missing notes and notes without a transcript are rejected here, before
    /// anything is queued.
    pub fn prepare_job(&self, note_id: i64) -> Result<IngestJob> {
        let note = self.storage.notes.require_note(note_id)?;
        let transcript = note.transcript.clone().ok_or_else(|| {
            FolioError::Validation(format!("note {} has no transcript to ingest", note_id))
        })?;

        Ok(IngestJob {
            note_id,
            folder_id: note.chunk_folder_id(),
            transcript,
        })
    }

    /// Start a background ingestion queue sharing this service's capabilities
    pub fn start_queue(&self) -> IngestQueue {
        IngestQueue::start(
            self.ingestion.clone(),
            self.storage.notes.clone(),
            self.embedder.clone(),
            self.queue_capacity,
        )
    }

    /// Answer a question from the transcripts of a folder
    pub fn ask(&self, folder_id: i64, query: &str) -> Result<String> {
        Ok(self.ask_with_sources(folder_id, query)?.answer)
    }

    pub fn ask_with_sources(&self, folder_id: i64, query: &str) -> Result<GroundedAnswer> {
        if query.trim().is_empty() {
            return Err(FolioError::Validation("query must not be empty".to_string()));
        }
        self.check_folder(folder_id)?;

        self.query.answer_with_sources(
            query,
            folder_id,
            self.embedder.as_ref(),
            self.completer.as_ref(),
        )
    }

    /// Nearest chunks of a folder with distances, without asking the model
    pub fn search(&self, folder_id: i64, query: &str, k: usize) -> Result<Vec<ChunkMatch>> {
        if query.trim().is_empty() {
            return Err(FolioError::Validation("query must not be empty".to_string()));
        }
        self.check_folder(folder_id)?;

        let vector = self
            .embedder
            .embed(query)
            .map_err(|source| FolioError::Embedding {
                context: format!("search in folder {}", folder_id),
                source,
            })?;
        self.storage
            .chunks
            .nearest_scored(folder_id, &vector, Some(self.embedder.model_name()), k)
    }

    /// Delete a note and its chunks; returns the number of chunks removed
    pub fn delete_note(&self, note_id: i64) -> Result<usize> {
        self.storage.notes.require_note(note_id)?;

        let deleted = self.storage.chunks.delete_by_note(note_id)?;
        self.storage.notes.delete_note(note_id)?;

        tracing::info!("Deleted note {} and {} chunks", note_id, deleted);
        Ok(deleted)
    }

    /// Move a note and its chunks to another folder (`None` unfiles it)
    pub fn move_note(&self, note_id: i64, folder_id: Option<i64>) -> Result<Note> {
        let note = self.storage.notes.move_note(note_id, folder_id)?;
        let moved = self
            .storage
            .chunks
            .reassign_folder(note_id, note.chunk_folder_id())?;

        tracing::info!(
            "Moved note {} and {} chunks to folder {}",
            note_id,
            moved,
            note.chunk_folder_id()
        );
        Ok(note)
    }

    fn run(&self, job: &IngestJob) -> Result<IngestReport> {
        run_tracked(
            &self.ingestion,
            &self.storage.notes,
            self.embedder.as_ref(),
            job,
        )
    }

    fn check_folder(&self, folder_id: i64) -> Result<()> {
        if folder_id == UNFILED_FOLDER_ID {
            return Ok(());
        }
        if folder_id < 0 {
            return Err(FolioError::Validation(format!(
                "folder id must not be negative, got {}",
                folder_id
            )));
        }
        self.storage.notes.require_folder(folder_id).map(|_| ())
    }
}
