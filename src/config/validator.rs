use crate::config::Config;
use crate::embedding::local_model_dimension;
use crate::error::{FolioError, Result, ValidationError};

const EMBEDDING_PROVIDERS: [&str; 2] = ["openai", "fastembed"];
const LLM_PROVIDERS: [&str; 2] = ["gemini", "openai"];

const OPENAI_HOST: &str = "api.openai.com";
const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

/// Host of the other HTTP provider, which `provider` must never be pointed at
fn foreign_host(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(GEMINI_HOST),
        "gemini" => Some(OPENAI_HOST),
        _ => None,
    }
}

fn validate_endpoint(
    section: &str,
    provider: &str,
    base_url: &str,
    api_key_env: &str,
    errors: &mut Vec<ValidationError>,
) {
    if base_url.is_empty() {
        errors.push(ValidationError::new(
            format!("{}.base_url", section),
            format!("Provider '{}' needs a base URL", provider),
        ));
    } else if let Some(host) = foreign_host(provider).filter(|host| base_url.contains(host)) {
        errors.push(ValidationError::new(
            format!("{}.base_url", section),
            format!(
                "Provider '{}' cannot use {} ({})",
                provider, host, base_url
            ),
        ));
    }

    if api_key_env.is_empty() {
        errors.push(ValidationError::new(
            format!("{}.api_key_env", section),
            format!("Provider '{}' needs an API key variable", provider),
        ));
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_transcription(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_ingestion(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FolioError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_path",
                "Database path cannot be empty",
            ));
        }

        if config.storage.pool_size == 0 {
            errors.push(ValidationError::new(
                "storage.pool_size",
                "Pool size must be greater than 0",
            ));
        }

        if config.storage.timeout_ms == 0 {
            errors.push(ValidationError::new(
                "storage.timeout_ms",
                "Store call timeout must be greater than 0",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.chunk_size_words == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size_words",
                "Chunk size must be greater than 0",
            ));
        }

        // The window must advance, otherwise chunking never terminates
        if chunking.overlap_words >= chunking.chunk_size_words {
            errors.push(ValidationError::new(
                "chunking.overlap_words",
                format!(
                    "Overlap ({}) must be smaller than chunk size ({})",
                    chunking.overlap_words, chunking.chunk_size_words
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if !EMBEDDING_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, provider
                ),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        match provider.as_str() {
            "openai" => validate_endpoint(
                "embedding",
                provider,
                &config.embedding.base_url,
                &config.embedding.api_key_env,
                errors,
            ),
            "fastembed" if !config.embedding.model.is_empty() => {
                match local_model_dimension(&config.embedding.model) {
                    None => errors.push(ValidationError::new(
                        "embedding.model",
                        format!("Unknown local model '{}'", config.embedding.model),
                    )),
                    Some(dimension) if dimension != config.embedding.dimension => {
                        errors.push(ValidationError::new(
                            "embedding.dimension",
                            format!(
                                "Model '{}' produces {} dimensions, configured {}",
                                config.embedding.model, dimension, config.embedding.dimension
                            ),
                        ))
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }

        if config.embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.llm.provider;
        if !LLM_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    LLM_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        if LLM_PROVIDERS.contains(&provider.as_str()) {
            validate_endpoint(
                "llm",
                provider,
                &config.llm.base_url,
                &config.llm.api_key_env,
                errors,
            );
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.max_tokens == 0 {
            errors.push(ValidationError::new(
                "llm.max_tokens",
                "Max tokens must be greater than 0",
            ));
        }
    }

    fn validate_transcription(config: &Config, errors: &mut Vec<ValidationError>) {
        let transcription = &config.transcription;
        if transcription.model.is_empty() {
            errors.push(ValidationError::new(
                "transcription.model",
                "Model name cannot be empty",
            ));
        }

        validate_endpoint(
            "transcription",
            "gemini",
            &transcription.base_url,
            &transcription.api_key_env,
            errors,
        );

        if transcription.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "transcription.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_ingestion(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingestion.queue_capacity == 0 {
            errors.push(ValidationError::new(
                "ingestion.queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(FolioError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk() {
        let mut config = Config::default();
        config.chunking.overlap_words = 300;
        assert_eq!(error_paths(&config), vec!["chunking.overlap_words"]);
    }

    #[test]
    fn test_invalid_providers() {
        let mut config = Config::default();
        config.embedding.provider = "cohere".to_string();
        config.llm.provider = "invalid".to_string();
        let paths = error_paths(&config);
        assert!(paths.contains(&"embedding.provider".to_string()));
        assert!(paths.contains(&"llm.provider".to_string()));
    }

    #[test]
    fn test_provider_switch_without_endpoint_is_rejected() {
        let mut config = Config::default();
        // Provider flipped by hand, endpoint and key left on Gemini
        config.llm.provider = "openai".to_string();
        let paths = error_paths(&config);
        assert_eq!(paths, vec!["llm.base_url"]);

        config.llm.switch_provider("gemini");
        config.llm.switch_provider("openai");
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_transcription_must_stay_on_gemini() {
        let mut config = Config::default();
        config.transcription.base_url = "https://api.openai.com/v1".to_string();
        config.transcription.api_key_env = String::new();
        let paths = error_paths(&config);
        assert!(paths.contains(&"transcription.base_url".to_string()));
        assert!(paths.contains(&"transcription.api_key_env".to_string()));
    }

    #[test]
    fn test_local_model_dimension_must_match() {
        let mut config = Config::default();
        config.embedding.switch_provider("fastembed");
        assert!(ConfigValidator::validate(&config).is_ok());

        config.embedding.dimension = 1536;
        assert_eq!(error_paths(&config), vec!["embedding.dimension"]);

        config.embedding.model = "word2vec".to_string();
        assert_eq!(error_paths(&config), vec!["embedding.model"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        config.storage.timeout_ms = 0;
        config.llm.temperature = 3.5;
        assert_eq!(error_paths(&config).len(), 3);
    }
}
