//! Retrieval-augmented question answering
//!
//! Embed the question, fetch the nearest transcript chunks of one folder,
//! ground a completion prompt in them and return the model's answer.

mod prompt;

pub use prompt::{build_context, build_prompt};

use crate::completion::CompletionService;
use crate::embedding::EmbeddingProvider;
use crate::error::{FolioError, Result};
use crate::storage::ChunkStore;
use std::sync::Arc;

/// Chunks used to ground an answer unless configured otherwise
pub const DEFAULT_TOP_K: usize = 5;

/// An answer together with the chunks it was grounded in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedAnswer {
    pub answer: String,
    /// Chunk texts, nearest first
    pub sources: Vec<String>,
}

/// Query orchestrator
pub struct QueryPipeline {
    store: Arc<dyn ChunkStore>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Up to `top_k` chunk texts of `folder_id` nearest to `query`
    pub fn retrieve(
        &self,
        query: &str,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<String>> {
        validate_query(query, folder_id)?;

        let vector = embedder.embed(query).map_err(|source| FolioError::Embedding {
            context: format!("query for folder {}", folder_id),
            source,
        })?;

        self.store
            .nearest_chunks_for_model(folder_id, &vector, embedder.model_name(), self.top_k)
    }

    /// Answer `query` from the transcripts of `folder_id`
    ///
    /// A folder without chunks still gets an answer, produced from an empty
    /// context. The completion text is returned verbatim.
    pub fn answer(
        &self,
        query: &str,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
        completer: &dyn CompletionService,
    ) -> Result<String> {
        Ok(self
            .answer_with_sources(query, folder_id, embedder, completer)?
            .answer)
    }

    /// Like [`answer`](Self::answer), also returning the grounding chunks
    pub fn answer_with_sources(
        &self,
        query: &str,
        folder_id: i64,
        embedder: &dyn EmbeddingProvider,
        completer: &dyn CompletionService,
    ) -> Result<GroundedAnswer> {
        let sources = self.retrieve(query, folder_id, embedder)?;
        tracing::debug!(
            "Grounding answer for folder {} in {} chunks",
            folder_id,
            sources.len()
        );

        let prompt = build_prompt(&build_context(&sources), query);

        let answer = completer
            .complete(&prompt)
            .map_err(|source| FolioError::Completion {
                context: format!("answer for folder {} ({})", folder_id, completer.model_name()),
                source,
            })?;

        tracing::info!(
            "Answered question for folder {} from {} chunks",
            folder_id,
            sources.len()
        );

        Ok(GroundedAnswer { answer, sources })
    }
}

fn validate_query(query: &str, folder_id: i64) -> Result<()> {
    if query.trim().is_empty() {
        return Err(FolioError::Validation("query must not be empty".to_string()));
    }
    if folder_id < 0 {
        return Err(FolioError::Validation(format!(
            "folder id must not be negative, got {}",
            folder_id
        )));
    }
    Ok(())
}
