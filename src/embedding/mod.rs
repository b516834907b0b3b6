//! Embedding generation
//!
//! - `EmbeddingProvider` trait, the capability the pipelines depend on
//! - `OpenAiEmbedder` for OpenAI-compatible HTTP endpoints (default, 1536-dim ada-002)
//! - `FastEmbedProvider` for local offline embedding (all-MiniLM-L6-v2, 384-dim)

mod openai;
mod provider;

pub use openai::OpenAiEmbedder;
pub use provider::{local_model_dimension, EmbeddingProvider, FastEmbedProvider};

use crate::config::EmbeddingConfig;
use crate::error::{FolioError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Build the embedding provider selected by the configuration
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(
                    "{} is not set; embedding calls will fail until it is provided",
                    config.api_key_env
                );
            }
            let embedder = OpenAiEmbedder::new(
                api_key,
                config.api_key_env.clone(),
                &config.base_url,
                config.model.clone(),
                config.dimension,
                Duration::from_secs(config.timeout_secs),
            )
            .map_err(|e| FolioError::Config(format!("Failed to build embedder: {}", e)))?;
            Ok(Arc::new(embedder))
        }
        "fastembed" => {
            let provider = FastEmbedProvider::new(&config.model)
                .map_err(|e| FolioError::Config(format!("Failed to build embedder: {}", e)))?;
            if provider.dimension() != config.dimension {
                return Err(FolioError::InvalidConfigValue {
                    path: "embedding.dimension".to_string(),
                    message: format!(
                        "{} produces {}-dimensional vectors, configured {}",
                        config.model,
                        provider.dimension(),
                        config.dimension
                    ),
                });
            }
            Ok(Arc::new(provider))
        }
        other => Err(FolioError::InvalidConfigValue {
            path: "embedding.provider".to_string(),
            message: format!("Unknown embedding provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_build_openai_embedder() {
        let config = Config::default();
        let embedder = build_embedder(&config.embedding).unwrap();
        assert_eq!(embedder.dimension(), 1536);
        assert_eq!(embedder.model_name(), "text-embedding-ada-002");
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(build_embedder(&config.embedding).is_err());
    }
}
