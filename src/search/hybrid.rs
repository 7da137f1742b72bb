//! Hybrid searcher: vector + trigram search fused with RRF
//!
//! The two first-stage searches are independent; the vector branch embeds
//! the query and searches, the lexical branch searches the raw text, and
//! both run concurrently before fusion. No snapshot isolation is assumed
//! between them.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{RetrievalConfig, SearchConfig};
use crate::embedding::{self, Embedder};
use crate::errors::{Result, RetrievalError};
use crate::search::fusion;
use crate::store::{DocumentStore, LexicalHit, QdrantConnector, ReconnectingStore, VectorHit};
use crate::telemetry::{emit, RetrievalEvent, TelemetryCollector};
use crate::types::{ArticleCategory, ScoredDocument, SearchSource};

/// Per-call overrides; `None` falls back to the searcher's configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Candidates per method
    pub k: Option<usize>,
    pub rrf_k: Option<u32>,
    /// Results after fusion
    pub final_k: Option<usize>,
}

impl SearchParams {
    pub fn with_final_k(final_k: usize) -> Self {
        Self {
            final_k: Some(final_k),
            ..Default::default()
        }
    }
}

/// Fused first-stage search over a document store
pub struct HybridSearcher {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    config: SearchConfig,
    telemetry: Option<TelemetryCollector>,
}

impl HybridSearcher {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn DocumentStore>, config: SearchConfig) -> Self {
        Self {
            embedder,
            store,
            config,
            telemetry: None,
        }
    }

    /// Configured embedder over a lazily connected, reconnecting Qdrant store
    pub fn from_config(config: &RetrievalConfig, telemetry: Option<TelemetryCollector>) -> Result<Self> {
        let embedder = embedding::from_config(&config.embedding)?;

        let mut store = ReconnectingStore::new(QdrantConnector::new(config.store.clone()));
        if let Some(t) = &telemetry {
            store = store.with_telemetry(t.clone());
        }

        let mut searcher = Self::new(embedder, Arc::new(store), config.search.clone());
        searcher.telemetry = telemetry;
        Ok(searcher)
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Fused vector + lexical search
    pub async fn search(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        params: SearchParams,
    ) -> Result<Vec<ScoredDocument>> {
        let k = params.k.unwrap_or(self.config.hybrid_search_k);
        let rrf_k = params.rrf_k.unwrap_or(self.config.rrf_k);
        let final_k = params.final_k.unwrap_or(self.config.final_k);
        let start = Instant::now();

        let vector_branch = async {
            let embedding = self.embedder.embed(query).await?;
            self.store.vector_search(&embedding, category, k).await
        };
        let lexical_branch = self
            .store
            .lexical_search(query, category, self.config.lexical_threshold, k);

        let (vector, lexical) = tokio::join!(vector_branch, lexical_branch);
        let lexical = lexical?;
        let vector = match vector {
            Ok(hits) => hits,
            Err(RetrievalError::EmbeddingFailure(reason)) => self.on_embedding_failure(reason, &lexical)?,
            Err(e) => return Err(e),
        };

        let (vector_hits, lexical_hits) = (vector.len(), lexical.len());
        let fused = fusion::fuse(vector, lexical, rrf_k, final_k);

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            category = ?category,
            vector_hits,
            lexical_hits,
            fused = fused.len(),
            duration_ms,
            "hybrid search complete"
        );
        emit(
            &self.telemetry,
            RetrievalEvent::SearchCompleted {
                vector_hits,
                lexical_hits,
                fused: fused.len(),
                duration_ms,
                timestamp: Instant::now(),
            },
        );

        Ok(fused)
    }

    /// Propagate, or continue with an empty vector list when configured
    fn on_embedding_failure(&self, reason: String, lexical: &[LexicalHit]) -> Result<Vec<VectorHit>> {
        tracing::error!(error = %reason, "failed to generate query embedding");
        emit(
            &self.telemetry,
            RetrievalEvent::EmbeddingFailed {
                reason: reason.clone(),
                timestamp: Instant::now(),
            },
        );

        if !self.config.lexical_fallback {
            return Err(RetrievalError::EmbeddingFailure(reason));
        }

        tracing::warn!(lexical_hits = lexical.len(), "falling back to lexical-only search");
        emit(
            &self.telemetry,
            RetrievalEvent::LexicalFallback {
                lexical_hits: lexical.len(),
                timestamp: Instant::now(),
            },
        );
        Ok(Vec::new())
    }

    /// Vector search alone; score is `1 - distance`
    pub async fn vector_search_only(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        let k = k.unwrap_or(self.config.final_k);
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.vector_search(&embedding, category, k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let mut scored = ScoredDocument::new(hit.document, 1.0 - f64::from(hit.distance));
                scored.matched_sources = vec![SearchSource::Vector];
                scored
            })
            .collect())
    }

    /// Trigram search alone; score is the similarity
    pub async fn fulltext_search_only(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<ScoredDocument>> {
        let k = k.unwrap_or(self.config.final_k);
        let threshold = threshold.unwrap_or(self.config.lexical_threshold);
        let hits = self.store.lexical_search(query, category, threshold, k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let mut scored = ScoredDocument::new(hit.document, f64::from(hit.similarity));
                scored.matched_sources = vec![SearchSource::Lexical];
                scored
            })
            .collect())
    }
}
