//! Local embedding engine: BERT-family sentence encoder via Candle
//!
//! Weights are fetched through hf-hub on first use and mean-pooled over
//! the attention mask.

use anyhow::Context;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::embedding::Embedder;
use crate::errors::{Result, RetrievalError};

/// Used when the configured model is an Ollama tag rather than a hub id
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

struct EncoderInner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// In-process embedder
pub struct LocalEmbedder {
    inner: Arc<EncoderInner>,
    model_id: String,
}

impl LocalEmbedder {
    /// Download (or reuse cached) weights and build the encoder
    pub fn load(model: &str) -> Result<Self> {
        let model_id = if model.contains('/') { model } else { DEFAULT_LOCAL_MODEL };
        let inner = load_encoder(model_id)
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("{:#}", e)))?;

        tracing::info!(model = model_id, "local embedding model loaded");

        Ok(Self {
            inner: Arc::new(inner),
            model_id: model_id.to_string(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn load_encoder(model_id: &str) -> anyhow::Result<EncoderInner> {
    let device = Device::Cpu;

    let api = Api::new().context("Failed to create HuggingFace API client")?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    let config_path = repo.get("config.json").context("Failed to download model config")?;
    let tokenizer_path = repo.get("tokenizer.json").context("Failed to download tokenizer")?;
    let weights_path = repo.get("model.safetensors").context("Failed to download model weights")?;

    let config_contents = std::fs::read_to_string(config_path).context("Failed to read config file")?;
    let config: Config = serde_json::from_str(&config_contents).context("Failed to parse model config")?;

    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

    // SAFETY: the safetensors file is not modified while mapped
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .context("Failed to load model weights")?
    };
    let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

    Ok(EncoderInner { model, tokenizer, device })
}

impl EncoderInner {
    fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * max_len;
            let ids = encoding.get_ids();
            flat_ids[offset..offset + ids.len()].copy_from_slice(ids);
            flat_mask[offset..offset + ids.len()].copy_from_slice(encoding.get_attention_mask());
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;

        let hidden = self.model.forward(&token_ids, &attention_mask, None)?;
        let pooled = mean_pool(&hidden, &attention_mask)?;

        Ok(pooled.to_vec2::<f32>()?)
    }
}

/// Mean pooling with attention mask
fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(embeddings.shape())?
        .to_dtype(embeddings.dtype())?;

    let summed = (embeddings * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

    summed.broadcast_div(&counts)
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingFailure("Encoder returned no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || inner.encode(&texts))
            .await
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("Encoder task failed: {}", e)))?
            .map_err(|e| RetrievalError::EmbeddingFailure(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        // batch 1, seq 2, hidden 2; second token is padding
        let hidden = Tensor::from_vec(vec![1.0f32, 3.0, 100.0, 100.0], (1, 2, 2), &device).unwrap();
        let mask = Tensor::from_vec(vec![1u32, 0], (1, 2), &device).unwrap();

        let pooled = mean_pool(&hidden, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled, vec![vec![1.0, 3.0]]);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embed_batch_shape() {
        let engine = LocalEmbedder::load(DEFAULT_LOCAL_MODEL).expect("Failed to load encoder");
        let texts = vec!["interview".to_string(), "culture".to_string()];
        let vectors = engine.embed_batch(&texts).await.expect("Failed to embed batch");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 384);
    }
}
