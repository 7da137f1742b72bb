//! Style profile retrieval
//!
//! Writing-rules profiles and sample excerpts that guide generation for a
//! category. This path is auxiliary: failures are logged and degrade to
//! `None` or an empty list instead of failing the caller.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::rerank::Reranker;
use crate::store::{StyleExcerpt, StyleStore};
use crate::types::{ArticleCategory, Document, ScoredDocument};

/// Excerpts returned when the caller does not ask for a count
pub const DEFAULT_EXCERPT_TOP_K: usize = 5;

pub struct StyleProfileRetriever {
    store: Arc<dyn StyleStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<Reranker>,
}

impl StyleProfileRetriever {
    pub fn new(store: Arc<dyn StyleStore>, embedder: Arc<dyn Embedder>, reranker: Arc<Reranker>) -> Self {
        Self {
            store,
            embedder,
            reranker,
        }
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_active()
    }

    /// Writing rules for the category, if any
    pub async fn retrieve_profile(&self, category: ArticleCategory) -> Option<String> {
        match self.store.profile(category).await {
            Ok(Some(profile)) => {
                tracing::debug!(%category, "retrieved style profile");
                Some(profile)
            }
            Ok(None) => {
                tracing::warn!(%category, "no style profile found");
                None
            }
            Err(e) => {
                tracing::warn!(%category, error = %e, "failed to retrieve style profile");
                None
            }
        }
    }

    /// Excerpts closest to `theme`
    ///
    /// Fetches twice the requested count, then reranks when a real reranker
    /// is active and there is more than one candidate.
    pub async fn retrieve_excerpts(&self, theme: &str, category: ArticleCategory, top_k: Option<usize>) -> Vec<String> {
        let top_k = top_k.unwrap_or(DEFAULT_EXCERPT_TOP_K);

        let embedding = match self.embedder.embed(theme).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "failed to embed style theme");
                return Vec::new();
            }
        };

        let excerpts = match self.store.excerpts(&embedding, category, top_k * 2).await {
            Ok(excerpts) => excerpts,
            Err(e) => {
                tracing::warn!(%category, error = %e, "failed to retrieve style excerpts");
                return Vec::new();
            }
        };

        if excerpts.is_empty() {
            tracing::debug!(%category, "no style excerpts found");
            return Vec::new();
        }

        if !self.reranker.is_active() || excerpts.len() == 1 {
            return excerpts.into_iter().take(top_k).map(|e| e.content).collect();
        }

        let candidates = excerpts.into_iter().map(|e| as_candidate(e, category)).collect();
        match self.reranker.rerank(theme, candidates, Some(top_k)).await {
            Ok(reranked) => reranked.into_iter().map(|d| d.document.content).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to rerank style excerpts");
                Vec::new()
            }
        }
    }

    /// Profile and excerpts together
    pub async fn retrieve_all(
        &self,
        theme: &str,
        category: ArticleCategory,
        excerpt_top_k: Option<usize>,
    ) -> (Option<String>, Vec<String>) {
        tokio::join!(
            self.retrieve_profile(category),
            self.retrieve_excerpts(theme, category, excerpt_top_k)
        )
    }
}

fn as_candidate(excerpt: StyleExcerpt, category: ArticleCategory) -> ScoredDocument {
    let similarity = 1.0 - f64::from(excerpt.distance);
    ScoredDocument::new(Document::new(None, excerpt.content, category), similarity)
}
