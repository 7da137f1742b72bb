//! Embedding providers
//!
//! The retrieval core only needs `embed` / `embed_batch`. Failures surface
//! as `RetrievalError::EmbeddingFailure` so callers can tell "no results"
//! apart from "encoder down".

pub mod client;
pub mod engine;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::errors::Result;

pub use client::OllamaEmbedder;
pub use engine::LocalEmbedder;

/// Text encoder producing dense vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the configured embedding backend
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::from_config(config)?)),
        EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedder::load(&config.model)?)),
    }
}
