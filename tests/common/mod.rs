//! Shared fakes for integration tests
#![allow(dead_code)]

use folio::completion::CompletionService;
use folio::config::Config;
use folio::embedding::EmbeddingProvider;
use folio::error::ProviderError;
use folio::service::NoteService;
use folio::storage::Storage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Axes of the keyword embedder
pub const TOPICS: [&str; 4] = ["budget", "launch", "hiring", "travel"];

/// Deterministic embedder: one axis per topic word, counting occurrences
///
/// A small constant component keeps every vector non-zero.
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    /// Fail the call with this zero-based index
    pub fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(call) == self.fail_on_call {
            return Err(ProviderError::Status {
                status: 503,
                body: "embedding service unavailable".to_string(),
            });
        }

        let mut vector = vec![0.0f32; TOPICS.len() + 1];
        for word in text.split_whitespace() {
            let word = word.to_ascii_lowercase();
            for (axis, topic) in TOPICS.iter().enumerate() {
                if word.contains(topic) {
                    vector[axis] += 1.0;
                }
            }
        }
        vector[TOPICS.len()] = 0.01;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        TOPICS.len() + 1
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Completer that records prompts and answers with a fixed reply
pub struct RecordingCompleter {
    pub prompts: Mutex<Vec<String>>,
    reply: String,
}

impl RecordingCompleter {
    pub fn new(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl CompletionService for RecordingCompleter {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "recording-test"
    }
}

/// `n` distinct filler words
pub fn words(n: usize) -> String {
    (0..n)
        .map(|i| format!("w{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A sentence about `topic`, `n` words long
pub fn topic_text(topic: &str, n: usize) -> String {
    (0..n)
        .map(|i| if i % 3 == 0 { topic.to_string() } else { format!("x{}", i) })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Service over a fresh database in a temp dir
pub fn test_service(
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionService>,
    atomic: bool,
) -> (TempDir, NoteService) {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.ingestion.atomic = atomic;

    let storage = Storage::open(&temp.path().join("folio.sqlite"), &config.storage).unwrap();
    let service = NoteService::new(storage, embedder, completer, &config).unwrap();
    (temp, service)
}
