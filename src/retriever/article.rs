//! Article retrieval facade
//!
//! Hybrid search followed by optional cross-encoder reranking. The facade
//! holds no per-call state; each retrieval is independent.

use futures_util::future::try_join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::config::RetrievalConfig;
use crate::errors::Result;
use crate::rerank::Reranker;
use crate::search::{HybridSearcher, SearchParams};
use crate::telemetry::{emit, RetrievalEvent, TelemetryCollector};
use crate::types::{ArticleCategory, ScoredDocument};

/// Results per category for `retrieve_all_types`
pub const DEFAULT_TOP_K_PER_TYPE: usize = 3;

/// Per-call knobs for [`ArticleRetriever::retrieve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveOptions {
    pub use_reranker: bool,
    /// Results kept after fusion (defaults to `search.final_k`)
    pub search_k: Option<usize>,
    /// Results kept after reranking (defaults to `reranker.top_k`)
    pub rerank_top_k: Option<usize>,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            use_reranker: true,
            search_k: None,
            rerank_top_k: None,
        }
    }
}

pub struct ArticleRetriever {
    searcher: HybridSearcher,
    reranker: Arc<Reranker>,
    telemetry: Option<TelemetryCollector>,
}

impl ArticleRetriever {
    pub fn new(searcher: HybridSearcher, reranker: impl Into<Arc<Reranker>>) -> Self {
        Self {
            searcher,
            reranker: reranker.into(),
            telemetry: None,
        }
    }

    /// Wire the configured embedder, Qdrant store and reranker
    ///
    /// Loading the cross-encoder may block on a weight download; a failed
    /// load leaves the facade on the passthrough reranker for its lifetime.
    pub fn from_config(config: &RetrievalConfig, telemetry: Option<TelemetryCollector>) -> Result<Self> {
        config.validate()?;

        let searcher = HybridSearcher::from_config(config, telemetry.clone())?;
        let reranker = Reranker::load_or_noop(&config.reranker, telemetry.clone());
        let mut retriever = Self::new(searcher, reranker);
        retriever.telemetry = telemetry;
        Ok(retriever)
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Whether a real cross-encoder is active
    pub fn has_reranker(&self) -> bool {
        self.reranker.is_active()
    }

    /// Shared handle, e.g. for a style retriever
    pub fn reranker(&self) -> Arc<Reranker> {
        Arc::clone(&self.reranker)
    }

    pub fn searcher(&self) -> &HybridSearcher {
        &self.searcher
    }

    /// Fused search, then rerank when requested
    pub async fn retrieve(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        options: RetrieveOptions,
    ) -> Result<Vec<ScoredDocument>> {
        let params = SearchParams {
            final_k: options.search_k,
            ..Default::default()
        };
        let documents = self.searcher.search(query, category, params).await?;

        if documents.is_empty() {
            tracing::debug!(query = %truncate_for_log(query), "no documents found");
            return Ok(documents);
        }
        if !options.use_reranker {
            return Ok(documents);
        }

        self.rerank(query, documents, options.rerank_top_k).await
    }

    /// Category-filtered retrieval with reranking on
    pub async fn retrieve_by_type(
        &self,
        query: &str,
        category: ArticleCategory,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        let options = RetrieveOptions {
            rerank_top_k: top_k,
            ..Default::default()
        };
        self.retrieve(query, Some(category), options).await
    }

    /// Search every query, merge by id, rerank against the first query
    ///
    /// Searches run concurrently; the first occurrence by submission order
    /// wins a duplicate id. Later queries do not influence rerank scores.
    /// Without a reranker the whole merged pool is returned unless
    /// `final_top_k` is given.
    pub async fn retrieve_multi_query<S: AsRef<str>>(
        &self,
        queries: &[S],
        category: Option<ArticleCategory>,
        final_top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        let Some(anchor) = queries.first() else {
            return Ok(Vec::new());
        };

        let searches = queries
            .iter()
            .map(|q| self.searcher.search(q.as_ref(), category, SearchParams::default()));
        let lists = try_join_all(searches).await?;

        let merged = merge_unique(lists);
        tracing::debug!(queries = queries.len(), merged = merged.len(), "merged multi-query results");
        if merged.is_empty() {
            return Ok(merged);
        }

        self.rerank(anchor.as_ref(), merged, final_top_k).await
    }

    /// One retrieval per category
    pub async fn retrieve_all_types(
        &self,
        query: &str,
        top_k_per_type: Option<usize>,
    ) -> Result<BTreeMap<ArticleCategory, Vec<ScoredDocument>>> {
        let options = RetrieveOptions {
            rerank_top_k: Some(top_k_per_type.unwrap_or(DEFAULT_TOP_K_PER_TYPE)),
            ..Default::default()
        };

        let per_type = ArticleCategory::ALL.iter().map(|&category| async move {
            let documents = self.retrieve(query, Some(category), options).await?;
            Ok::<_, crate::errors::RetrievalError>((category, documents))
        });

        Ok(try_join_all(per_type).await?.into_iter().collect())
    }

    /// Cross-encoder pass; without an active model the fused list is kept
    /// whole unless the caller asked for an explicit count
    async fn rerank(
        &self,
        query: &str,
        mut documents: Vec<ScoredDocument>,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        if self.reranker.is_active() {
            return self.reranker.rerank(query, documents, top_k).await;
        }

        emit(
            &self.telemetry,
            RetrievalEvent::RerankSkipped {
                candidates: documents.len(),
                timestamp: Instant::now(),
            },
        );
        if let Some(top_k) = top_k {
            documents.truncate(top_k);
        }
        Ok(documents)
    }
}

/// Concatenate in list order dropping repeated ids, then order by fused score
fn merge_unique(lists: Vec<Vec<ScoredDocument>>) -> Vec<ScoredDocument> {
    let mut seen = HashSet::new();
    let mut merged: Vec<ScoredDocument> = lists
        .into_iter()
        .flatten()
        .filter(|doc| doc.id().map_or(true, |id| seen.insert(id)))
        .collect();

    // Stable: equal scores keep submission order
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged
}

fn truncate_for_log(query: &str) -> String {
    query.chars().take(50).collect()
}
