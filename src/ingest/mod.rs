//! Transcript ingestion
//!
//! Delete a note's prior chunks, chunk the transcript, embed each chunk and
//! persist it. Chunks are processed one at a time, in order.

mod queue;
mod transcript;

pub use queue::{IngestJob, IngestQueue, QueueStats};
pub(crate) use queue::run_tracked;
pub use transcript::{
    transcription_prompt, TranscriptLanguage, TranscriptResult, TRANSCRIPT_SEPARATOR,
};

use crate::chunking::ChunkPolicy;
use crate::embedding::EmbeddingProvider;
use crate::error::{FolioError, IngestStage, Result};
use crate::storage::{ChunkStore, NewChunk};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub note_id: i64,
    pub folder_id: i64,
    /// Chunks of the previous run that were removed
    pub deleted: usize,
    /// Chunks persisted by this run
    pub stored: usize,
    /// Chunks dropped because their text was blank
    pub skipped_blank: usize,
    pub elapsed: Duration,
}

/// Ingestion orchestrator
pub struct IngestionPipeline {
    store: Arc<dyn ChunkStore>,
    policy: ChunkPolicy,
    atomic: bool,
}

impl IngestionPipeline {
    /// Incremental pipeline: chunks persisted before a failure stay in the store
    pub fn new(store: Arc<dyn ChunkStore>, policy: ChunkPolicy) -> Self {
        Self {
            store,
            policy,
            atomic: false,
        }
    }

    /// Stage every chunk before touching the store, then replace the note's
    /// chunk set in one transaction
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Ingest `transcript` as the chunk set of `note_id`
    ///
    /// An empty transcript succeeds with zero chunks. Failures carry the
    /// stage and chunk index at which the run stopped; nothing is retried.
    pub fn ingest(
        &self,
        transcript: &str,
        note_id: i64,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<IngestReport> {
        if note_id < 1 {
            return Err(FolioError::Validation(format!(
                "note id must be positive, got {}",
                note_id
            )));
        }
        if folder_id < 0 {
            return Err(FolioError::Validation(format!(
                "folder id must not be negative, got {}",
                folder_id
            )));
        }

        let start = Instant::now();
        tracing::info!(
            "Ingesting note {} into folder {} ({} mode, model {})",
            note_id,
            folder_id,
            if self.atomic { "atomic" } else { "incremental" },
            embedder.model_name()
        );

        let result = if self.atomic {
            self.ingest_atomic(transcript, note_id, folder_id, embedder)
        } else {
            self.ingest_incremental(transcript, note_id, folder_id, embedder)
        };

        match result {
            Ok((deleted, stored, skipped_blank)) => {
                let report = IngestReport {
                    note_id,
                    folder_id,
                    deleted,
                    stored,
                    skipped_blank,
                    elapsed: start.elapsed(),
                };
                tracing::info!(
                    "Ingested note {}: {} chunks stored, {} replaced in {:?}",
                    note_id,
                    report.stored,
                    report.deleted,
                    report.elapsed
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Ingestion of note {} aborted: {}", note_id, e);
                Err(e)
            }
        }
    }

    fn ingest_incremental(
        &self,
        transcript: &str,
        note_id: i64,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<(usize, usize, usize)> {
        let deleted = self
            .store
            .delete_by_note(note_id)
            .map_err(|e| stage_error(note_id, IngestStage::DeletePrior, e))?;

        let chunks = self.policy.chunk(transcript);
        if chunks.is_empty() {
            tracing::debug!("Note {} has an empty transcript, nothing to embed", note_id);
            return Ok((deleted, 0, 0));
        }

        let mut stored = 0;
        let mut skipped_blank = 0;
        for (chunk_index, text) in chunks.into_iter().enumerate() {
            if text.trim().is_empty() {
                skipped_blank += 1;
                continue;
            }

            let embedding = embed_chunk(embedder, &text, note_id, chunk_index)?;

            self.store
                .insert(NewChunk {
                    note_id,
                    folder_id,
                    text,
                    embedding,
                    model: embedder.model_name().to_string(),
                })
                .map_err(|e| stage_error(note_id, IngestStage::Persist { chunk_index }, e))?;
            stored += 1;
        }

        Ok((deleted, stored, skipped_blank))
    }

    fn ingest_atomic(
        &self,
        transcript: &str,
        note_id: i64,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<(usize, usize, usize)> {
        let mut staged = Vec::new();
        let mut skipped_blank = 0;

        for (chunk_index, text) in self.policy.chunk(transcript).into_iter().enumerate() {
            if text.trim().is_empty() {
                skipped_blank += 1;
                continue;
            }

            let embedding = embed_chunk(embedder, &text, note_id, chunk_index)?;
            staged.push(NewChunk {
                note_id,
                folder_id,
                text,
                embedding,
                model: embedder.model_name().to_string(),
            });
        }

        let outcome = self
            .store
            .replace_note_chunks(note_id, staged)
            .map_err(|e| stage_error(note_id, IngestStage::Commit, e))?;

        Ok((outcome.deleted, outcome.inserted.len(), skipped_blank))
    }
}

fn embed_chunk(
    embedder: &dyn EmbeddingProvider,
    text: &str,
    note_id: i64,
    chunk_index: usize,
) -> Result<Vec<f32>> {
    embedder.embed(text).map_err(|source| {
        stage_error(
            note_id,
            IngestStage::Embed { chunk_index },
            FolioError::Embedding {
                context: format!("chunk {} of note {}", chunk_index, note_id),
                source,
            },
        )
    })
}

fn stage_error(note_id: i64, stage: IngestStage, source: FolioError) -> FolioError {
    FolioError::Ingestion {
        note_id,
        stage,
        source: Box::new(source),
    }
}
