//! Embedding provider trait and FastEmbed implementation
use crate::error::ProviderError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Trait for embedding generators
///
/// Maps text to a fixed-dimension vector. Every vector compared against
/// another must come from the same provider and model.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Reject vectors whose length differs from the provider's dimension
pub(crate) fn check_dimension(embedding: &[f32], expected: usize) -> Result<(), ProviderError> {
    if embedding.is_empty() {
        return Err(ProviderError::EmptyResult);
    }
    if embedding.len() != expected {
        return Err(ProviderError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// Local models known to fastembed, with their output dimension
const LOCAL_MODELS: [(&str, usize); 3] = [
    ("all-minilm-l6-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
];

/// Offline embedder backed by fastembed
///
/// Weights are fetched into the huggingface cache on first use.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self, ProviderError> {
        let (embedding_model, dimension) = local_model(model_name).ok_or_else(|| {
            let supported: Vec<&str> = LOCAL_MODELS.iter().map(|(name, _)| *name).collect();
            ProviderError::Initialization(format!(
                "Unsupported local model '{}', expected one of {}",
                model_name,
                supported.join(", ")
            ))
        })?;

        tracing::info!("Loading local embedding model {} ({} dims)", model_name, dimension);

        let options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    pub fn with_default_model() -> Result<Self, ProviderError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

/// Output dimension of a supported local model, matched case-insensitively
pub fn local_model_dimension(name: &str) -> Option<usize> {
    let name = name.to_ascii_lowercase();
    LOCAL_MODELS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, dimension)| *dimension)
}

fn local_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let dimension = local_model_dimension(name)?;

    let model = match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        _ => EmbeddingModel::BGEBaseENV15,
    };
    Some((model, dimension))
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("Empty text".to_string()));
        }

        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let embedding = embeddings.pop().ok_or(ProviderError::EmptyResult)?;
        check_dimension(&embedding, self.dimension)?;

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&[0.1, 0.2], 2).is_ok());
        assert!(matches!(
            check_dimension(&[], 2),
            Err(ProviderError::EmptyResult)
        ));
        assert!(matches!(
            check_dimension(&[0.1], 2),
            Err(ProviderError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_local_model_lookup_ignores_case() {
        assert_eq!(local_model("All-MiniLM-L6-v2").map(|(_, d)| d), Some(384));
        assert_eq!(local_model("bge-base-en-v1.5").map(|(_, d)| d), Some(768));
        assert!(local_model("nomic-embed-text").is_none());
    }

    #[test]
    fn test_unsupported_model() {
        let result = FastEmbedProvider::new("text-embedding-ada-002");
        assert!(matches!(result, Err(ProviderError::Initialization(_))));
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider
            .embed("The meeting moved to Thursday afternoon.")
            .unwrap();
        assert_eq!(embedding.len(), 384);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.1);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_empty_text() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert!(provider.embed("   ").is_err());
    }
}
