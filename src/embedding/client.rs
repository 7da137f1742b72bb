//! Ollama embedding client
//!
//! Calls POST /api/embed with a batched `input` array and reads the
//! `embeddings` matrix back.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::errors::{Result, RetrievalError};

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// HTTP embedder backed by a running Ollama instance
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new embedder
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the Ollama API (e.g. http://127.0.0.1:11434)
    /// * `model` - Embedding model tag (e.g. "nomic-embed-text")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(
            format!("http://{}:{}", config.host, config.port),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("Failed to reach embedding service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::EmbeddingFailure(format!(
                "Embedding service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("Failed to parse response: {}", e)))?;

        check_batch(parsed.embeddings, texts.len())
    }
}

/// Reject responses whose shape does not match the request
fn check_batch(embeddings: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if embeddings.len() != expected {
        return Err(RetrievalError::EmbeddingFailure(format!(
            "Expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }

    if embeddings.iter().any(|e| e.is_empty()) {
        return Err(RetrievalError::EmbeddingFailure("Empty embedding vector in response".to_string()));
    }

    Ok(embeddings)
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.request(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingFailure("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "nomic-embed-text", Duration::from_secs(5)).unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434");
        assert_eq!(embedder.model(), "nomic-embed-text");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        let checked = check_batch(parsed.embeddings, 2).unwrap();
        assert_eq!(checked[1], vec![0.3, 0.4]);
    }

    #[test]
    fn test_count_mismatch_is_embedding_failure() {
        let err = check_batch(vec![vec![0.1]], 2).unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingFailure(_)));
    }

    #[test]
    fn test_empty_vector_rejected() {
        assert!(check_batch(vec![Vec::new()], 1).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_failure() {
        // Port 9 (discard) is not an HTTP server
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_millis(500)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_millis(500)).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Ollama with an embedding model
    async fn test_live_embed() {
        let embedder = OllamaEmbedder::from_config(&EmbeddingConfig::default()).unwrap();
        let vector = embedder.embed("new graduate hiring event").await.unwrap();
        assert!(!vector.is_empty());
    }
}
