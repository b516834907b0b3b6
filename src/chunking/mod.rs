//! Word-window chunking of transcripts
//!
//! Transcripts are split on whitespace and re-joined with single spaces into
//! overlapping windows of a fixed word count.

use crate::error::{FolioError, Result};
use serde::{Deserialize, Serialize};

/// Words per chunk used by the ingestion pipeline
pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 300;

/// Words shared by consecutive chunks
pub const DEFAULT_OVERLAP_WORDS: usize = 50;

/// Sliding-window chunking policy
///
/// Construction enforces `overlap_words < chunk_size_words`, so the window
/// always advances and chunking terminates. Deserialization goes through the
/// same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyFields")]
pub struct ChunkPolicy {
    chunk_size_words: usize,
    overlap_words: usize,
}

#[derive(Deserialize)]
struct PolicyFields {
    chunk_size_words: usize,
    overlap_words: usize,
}

impl TryFrom<PolicyFields> for ChunkPolicy {
    type Error = FolioError;

    fn try_from(fields: PolicyFields) -> Result<Self> {
        Self::new(fields.chunk_size_words, fields.overlap_words)
    }
}

impl ChunkPolicy {
    pub fn new(chunk_size_words: usize, overlap_words: usize) -> Result<Self> {
        if chunk_size_words == 0 {
            return Err(FolioError::Validation(
                "chunk size must be at least one word".to_string(),
            ));
        }
        if overlap_words >= chunk_size_words {
            return Err(FolioError::Validation(format!(
                "overlap ({} words) must be smaller than chunk size ({} words)",
                overlap_words, chunk_size_words
            )));
        }

        Ok(Self {
            chunk_size_words,
            overlap_words,
        })
    }

    pub fn chunk_size_words(&self) -> usize {
        self.chunk_size_words
    }

    pub fn overlap_words(&self) -> usize {
        self.overlap_words
    }

    /// Number of words the window start moves per chunk (always > 0)
    pub fn stride(&self) -> usize {
        self.chunk_size_words - self.overlap_words
    }

    /// Split `text` into overlapping chunks
    ///
    /// Empty or whitespace-only input yields no chunks. Input of at most
    /// `chunk_size_words` words yields a single whitespace-normalized chunk.
    /// The final chunk may be shorter than the window.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();

        if words.is_empty() {
            return Vec::new();
        }

        if words.len() <= self.chunk_size_words {
            return vec![words.join(" ")];
        }

        let mut chunks = Vec::with_capacity(words.len() / self.stride() + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += self.stride();
        }

        chunks
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size_words: DEFAULT_CHUNK_SIZE_WORDS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
        }
    }
}

/// Chunk `text` with an explicit window and overlap
pub fn chunk(text: &str, chunk_size_words: usize, overlap_words: usize) -> Result<Vec<String>> {
    Ok(ChunkPolicy::new(chunk_size_words, overlap_words)?.chunk(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let policy = ChunkPolicy::default();
        assert!(policy.chunk("").is_empty());
        assert!(policy.chunk("  \n\t ").is_empty());
    }

    #[test]
    fn test_short_input_is_single_normalized_chunk() {
        let policy = ChunkPolicy::default();
        let chunks = policy.chunk("  hello   there\n\ngeneral\tkenobi ");
        assert_eq!(chunks, vec!["hello there general kenobi".to_string()]);
    }

    #[test]
    fn test_exactly_window_sized_input() {
        let policy = ChunkPolicy::default();
        let chunks = policy.chunk(&words(300));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].split(' ').count(), 300);
    }

    #[test]
    fn test_650_words_gives_three_chunks() {
        let policy = ChunkPolicy::default();
        let chunks = policy.chunk(&words(650));

        assert_eq!(chunks.len(), 3);
        let first: Vec<&str> = chunks[0].split(' ').collect();
        let second: Vec<&str> = chunks[1].split(' ').collect();
        let third: Vec<&str> = chunks[2].split(' ').collect();

        assert_eq!(first.len(), 300);
        assert_eq!(first[0], "w0");
        assert_eq!(second[0], "w250");
        assert_eq!(second[299], "w549");
        assert_eq!(third[0], "w500");
        assert_eq!(third.len(), 150);
        assert_eq!(third[149], "w649");
    }

    #[test]
    fn test_consecutive_chunks_overlap_and_reconstruct() {
        let policy = ChunkPolicy::default();
        let source = words(1234);
        let chunks = policy.chunk(&source);

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].split(' ').collect();
            let next: Vec<&str> = pair[1].split(' ').collect();
            assert_eq!(&prev[prev.len() - 50..], &next[..50]);
        }

        let mut rebuilt: Vec<&str> = chunks[0].split(' ').collect();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.split(' ').skip(50));
        }
        let original: Vec<&str> = source.split(' ').collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_last_window_ending_exactly_at_end() {
        // 550 words: windows [0,300) and [250,550); no trailing duplicate
        let chunks = chunk(&words(550), 300, 50).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].ends_with("w549"));
    }

    #[test]
    fn test_invalid_policies_rejected() {
        assert!(ChunkPolicy::new(0, 0).is_err());
        assert!(ChunkPolicy::new(50, 50).is_err());
        assert!(ChunkPolicy::new(50, 60).is_err());
        assert!(ChunkPolicy::new(2, 1).is_ok());
    }

    #[test]
    fn test_no_overlap_partitions_words() {
        let chunks = chunk("a b c d e", 2, 0).unwrap();
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_deserialize_enforces_overlap_bound() {
        let policy: ChunkPolicy = toml::from_str("chunk_size_words = 10\noverlap_words = 2").unwrap();
        assert_eq!(policy.stride(), 8);

        assert!(toml::from_str::<ChunkPolicy>("chunk_size_words = 300\noverlap_words = 300").is_err());
        assert!(toml::from_str::<ChunkPolicy>("chunk_size_words = 50\noverlap_words = 60").is_err());
        assert!(toml::from_str::<ChunkPolicy>("chunk_size_words = 0\noverlap_words = 0").is_err());
    }
}
