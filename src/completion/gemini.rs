//! Gemini `generateContent` client, used for answers and audio transcription.

use super::CompletionService;
use crate::error::ProviderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Blocking Gemini client
pub struct GeminiCompleter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    model: String,
    audio_model: String,
}

impl GeminiCompleter {
    pub fn new(
        api_key: Option<String>,
        api_key_env: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        audio_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_key_env: api_key_env.into(),
            model: model.into(),
            audio_model: audio_model.into(),
        })
    }

    /// Send an audio file inline and return the model's text reply
    ///
    /// The reply is expected to hold a transcript and a summary separated by
    /// `##**##` (see `ingest::TranscriptResult`).
    pub fn transcribe_audio(&self, audio_path: &Path, prompt: &str) -> Result<String, ProviderError> {
        let audio = std::fs::read(audio_path).map_err(|e| {
            ProviderError::InvalidInput(format!(
                "cannot read audio file {}: {}",
                audio_path.display(),
                e
            ))
        })?;

        let parts = vec![
            Part::text(prompt),
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: audio_mime_type(audio_path),
                    data: STANDARD.encode(audio),
                }),
            },
        ];

        self.generate(&self.audio_model, parts)
    }

    fn generate(&self, model: &str, parts: Vec<Part<'_>>) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredentials(self.api_key_env.clone()))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.trim())])
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(ProviderError::EmptyResult)
    }
}

impl CompletionService for GeminiCompleter {
    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate(&self.model, vec![Part::text(prompt)])
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// MIME type from the audio file extension (mpeg when unknown)
pub fn audio_mime_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "audio/mpeg",
    }
    .to_string()
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl<'a> Part<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: String,
}
