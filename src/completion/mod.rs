//! LLM completion services used to answer folder questions

mod gemini;
mod openai;

pub use gemini::{audio_mime_type, GeminiCompleter};
pub use openai::OpenAiCompleter;

use crate::config::{LlmConfig, TranscriptionConfig};
use crate::error::{FolioError, ProviderError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Text completion capability
pub trait CompletionService: Send + Sync {
    /// Complete `prompt` and return the model's text verbatim
    fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the completion service selected by the configuration
pub fn build_completer(config: &LlmConfig) -> Result<Arc<dyn CompletionService>> {
    let api_key = std::env::var(&config.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(
            "{} is not set; completion calls will fail until it is provided",
            config.api_key_env
        );
    }
    let timeout = Duration::from_secs(config.timeout_secs);

    match config.provider.as_str() {
        "gemini" => {
            // Answers never carry audio, so the chat model doubles as the audio model
            let gemini = build_gemini(
                api_key,
                &config.api_key_env,
                &config.base_url,
                &config.model,
                &config.model,
                timeout,
            )?;
            Ok(Arc::new(gemini))
        }
        "openai" => {
            let completer = OpenAiCompleter::new(
                api_key,
                config.api_key_env.clone(),
                &config.base_url,
                config.model.clone(),
                config.temperature,
                config.max_tokens,
                timeout,
            )
            .map_err(|e| FolioError::Config(format!("Failed to build completer: {}", e)))?;
            Ok(Arc::new(completer))
        }
        other => Err(FolioError::InvalidConfigValue {
            path: "llm.provider".to_string(),
            message: format!("Unknown completion provider '{}'", other),
        }),
    }
}

/// Build the Gemini audio client from `[transcription]`
///
/// Independent of `llm.provider`; audio transcription is only offered by Gemini.
pub fn build_transcriber(config: &TranscriptionConfig) -> Result<GeminiCompleter> {
    let api_key = std::env::var(&config.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(
            "{} is not set; transcription calls will fail until it is provided",
            config.api_key_env
        );
    }
    build_gemini(
        api_key,
        &config.api_key_env,
        &config.base_url,
        &config.model,
        &config.model,
        Duration::from_secs(config.timeout_secs),
    )
}

fn build_gemini(
    api_key: Option<String>,
    api_key_env: &str,
    base_url: &str,
    model: &str,
    audio_model: &str,
    timeout: Duration,
) -> Result<GeminiCompleter> {
    GeminiCompleter::new(api_key, api_key_env, base_url, model, audio_model, timeout)
        .map_err(|e| FolioError::Config(format!("Failed to build Gemini client: {}", e)))
}
