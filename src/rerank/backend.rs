//! Candle cross-encoder backend
//!
//! XLM-RoBERTa sequence classifier with a single relevance logit, the
//! architecture of the BGE reranker family. Weights come from hf-hub.

use anyhow::Context;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config, XLMRobertaForSequenceClassification};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::errors::{Result, RetrievalError};
use crate::rerank::{PairScores, PairScorer};

pub struct CandleScorer {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    max_length: usize,
}

impl CandleScorer {
    /// Download (or reuse cached) weights; failures are `RerankerUnavailable`
    pub fn load(model_name: &str, max_length: usize, use_fp16: bool) -> Result<Self> {
        load_scorer(model_name, max_length, use_fp16)
            .map_err(|e| RetrievalError::RerankerUnavailable(format!("{:#}", e)))
    }

    fn forward(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
        let encodings = self
            .tokenizer
            .encode_batch(pairs.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let rows: Vec<Vec<u32>> = encodings
            .iter()
            .map(|e| truncate_pair(e.get_ids(), self.max_length))
            .collect();
        let (ids, mask, width) = pad_batch(&rows);
        let batch_size = rows.len();

        let input_ids = Tensor::from_vec(ids, (batch_size, width), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (batch_size, width), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let logits = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)?
            .to_dtype(DType::F32)?
            .to_vec2::<f32>()?;

        logits
            .into_iter()
            .map(|row| row.first().copied().context("Classifier produced an empty row"))
            .collect()
    }
}

fn load_scorer(model_name: &str, max_length: usize, use_fp16: bool) -> anyhow::Result<CandleScorer> {
    let device = Device::cuda_if_available(0).context("Failed to select device")?;
    // Half precision only pays off on an accelerator
    let dtype = if use_fp16 && !device.is_cpu() { DType::F16 } else { DType::F32 };

    let api = Api::new().context("Failed to create HuggingFace API client")?;
    let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

    let config_path = repo.get("config.json").context("Failed to download model config")?;
    let tokenizer_path = repo.get("tokenizer.json").context("Failed to download tokenizer")?;
    let weights_path = repo.get("model.safetensors").context("Failed to download model weights")?;

    let config: Config = serde_json::from_str(
        &std::fs::read_to_string(config_path).context("Failed to read config file")?,
    )
    .context("Failed to parse model config")?;

    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

    // SAFETY: the safetensors file is not modified while mapped
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, &device)
            .context("Failed to load model weights")?
    };
    let model = XLMRobertaForSequenceClassification::new(1, &config, vb)
        .context("Failed to create cross-encoder model")?;

    Ok(CandleScorer {
        model,
        tokenizer,
        device,
        model_name: model_name.to_string(),
        max_length: max_length.max(2),
    })
}

impl PairScorer for CandleScorer {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<PairScores> {
        if pairs.is_empty() {
            return Ok(PairScores::Batch(Vec::new()));
        }
        let scores = self
            .forward(pairs)
            .map_err(|e| RetrievalError::RerankFailed(format!("{:#}", e)))?;
        Ok(PairScores::Batch(scores))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Cut to `max_length` tokens, keeping the closing separator
fn truncate_pair(ids: &[u32], max_length: usize) -> Vec<u32> {
    if ids.len() <= max_length {
        return ids.to_vec();
    }
    let mut truncated = ids[..max_length - 1].to_vec();
    truncated.extend(ids.last().copied());
    truncated
}

/// Right-pad rows with the XLM-R pad id; returns ids, mask and width
fn pad_batch(rows: &[Vec<u32>]) -> (Vec<u32>, Vec<u32>, usize) {
    const PAD_ID: u32 = 1;
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut ids = vec![PAD_ID; rows.len() * width];
    let mut mask = vec![0u32; rows.len() * width];
    for (i, row) in rows.iter().enumerate() {
        let offset = i * width;
        ids[offset..offset + row.len()].copy_from_slice(row);
        mask[offset..offset + row.len()].fill(1);
    }
    (ids, mask, width)
}
