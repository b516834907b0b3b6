//! OpenAI-compatible embeddings client.

use super::provider::{check_dimension, EmbeddingProvider};
use crate::error::ProviderError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// A missing API key is reported on each call rather than at construction.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: Option<String>,
        api_key_env: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_key_env: api_key_env.into(),
            model: model.into(),
            dimension,
        })
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredentials(self.api_key_env.clone()))?;

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("Empty text".to_string()));
        }

        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.trim())
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

        let mut parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        parsed.data.sort_by_key(|entry| entry.index);

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or(ProviderError::EmptyResult)?;
        check_dimension(&embedding, self.dimension)?;

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(url: &str, key: Option<&str>, dimension: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            key.map(str::to_string),
            "OPENAI_API_KEY",
            url,
            "text-embedding-ada-002",
            dimension,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_embed_success() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"text-embedding-ada-002","input":"hello world"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"object":"list","data":[{"object":"embedding","embedding":[0.1,0.2,0.3],"index":0}],"model":"text-embedding-ada-002"}"#,
            )
            .create();

        let vector = embedder(&server.url(), Some("sk-test"), 3)
            .embed("hello world")
            .unwrap();

        mock.assert();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_missing_key_fails_without_request() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/embeddings").expect(0).create();

        let result = embedder(&server.url(), None, 3).embed("hello");

        mock.assert();
        assert!(matches!(result, Err(ProviderError::MissingCredentials(env)) if env == "OPENAI_API_KEY"));
    }

    #[test]
    fn test_non_success_status() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/embeddings")
            .with_status(429)
            .with_body("rate limited")
            .create();

        let result = embedder(&server.url(), Some("sk-test"), 3).embed("hello");
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 429, ref body }) if body == "rate limited"
        ));
    }

    #[test]
    fn test_empty_data() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create();

        let result = embedder(&server.url(), Some("sk-test"), 3).embed("hello");
        assert!(matches!(result, Err(ProviderError::EmptyResult)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2],"index":0}]}"#)
            .create();

        let result = embedder(&server.url(), Some("sk-test"), 3).embed("hello");
        assert!(matches!(
            result,
            Err(ProviderError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
