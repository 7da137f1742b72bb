//! End-to-end retrieval tests against the in-memory store
//!
//! No external services: embeddings are letter histograms and the
//! cross-encoder is a word-overlap scorer.

mod common;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{fixture, HistogramEmbedder};
use recruitrag::config::SearchConfig;
use recruitrag::search::{HybridSearcher, SearchParams};
use recruitrag::store::{DocumentStore, LexicalHit, ReconnectingStore, StoreConnector, VectorHit};
use recruitrag::telemetry::TelemetryCollector;
use recruitrag::types::{ArticleCategory, Document, DocumentId, SearchSource};
use recruitrag::{Result, RetrievalError, RetrieveOptions};

/// Store replaying fixed ranked lists regardless of the query
struct ScriptedStore {
    vector: Vec<VectorHit>,
    lexical: Vec<LexicalHit>,
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn vector_search(&self, _: &[f32], _: Option<ArticleCategory>, k: usize) -> Result<Vec<VectorHit>> {
        Ok(self.vector.iter().take(k).cloned().collect())
    }

    async fn lexical_search(&self, _: &str, _: Option<ArticleCategory>, _: f32, k: usize) -> Result<Vec<LexicalHit>> {
        Ok(self.lexical.iter().take(k).cloned().collect())
    }
}

fn doc(id: u64) -> Document {
    Document::new(Some(DocumentId::Num(id)), format!("article {}", id), ArticleCategory::Interview)
}

#[tokio::test]
async fn test_rank_not_raw_score_decides_fusion() {
    // A is #1 by vector and #3 lexically, B is #2 by vector and #1 lexically
    let (a, b, c) = (doc(1), doc(2), doc(3));
    let store = ScriptedStore {
        vector: vec![
            VectorHit { document: a.clone(), distance: 0.1 },
            VectorHit { document: b.clone(), distance: 0.4 },
            VectorHit { document: c.clone(), distance: 0.9 },
        ],
        lexical: vec![
            LexicalHit { document: b, similarity: 0.6 },
            LexicalHit { document: c, similarity: 0.3 },
            LexicalHit { document: a, similarity: 0.2 },
        ],
    };

    let searcher = HybridSearcher::new(Arc::new(HistogramEmbedder::default()), Arc::new(store), SearchConfig::default());
    let results = searcher.search("anything", None, SearchParams::default()).await.unwrap();

    let ids: Vec<_> = results.iter().filter_map(|r| r.id()).collect();
    assert_eq!(ids, vec![DocumentId::Num(2), DocumentId::Num(1), DocumentId::Num(3)]);

    let score_a = 1.0 / 51.0 + 1.0 / 53.0;
    let score_b = 1.0 / 52.0 + 1.0 / 51.0;
    assert!((results[0].score - score_b).abs() < 1e-12);
    assert!((results[1].score - score_a).abs() < 1e-12);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn test_retrieve_is_idempotent() {
    let f = fixture(true);
    let first = f.retriever.retrieve("new graduate engineer", None, RetrieveOptions::default()).await.unwrap();
    let second = f.retriever.retrieve("new graduate engineer", None, RetrieveOptions::default()).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_category_filter_excludes_other_categories() {
    let f = fixture(false);
    let options = RetrieveOptions {
        use_reranker: false,
        ..Default::default()
    };

    let unfiltered = f.retriever.retrieve("new graduate engineer", None, options).await.unwrap();
    assert!(unfiltered.iter().any(|r| r.document.category != ArticleCategory::Interview));

    let filtered = f
        .retriever
        .retrieve("new graduate engineer", Some(ArticleCategory::Interview), options)
        .await
        .unwrap();
    assert!(!filtered.is_empty());
    assert!(filtered.iter().all(|r| r.document.category == ArticleCategory::Interview));
}

#[tokio::test]
async fn test_unavailable_reranker_keeps_fused_order() {
    let telemetry = TelemetryCollector::new();
    let f = fixture(false);
    let retriever = f.retriever.with_telemetry(telemetry.clone());
    assert!(!retriever.has_reranker());

    let fused = retriever
        .searcher()
        .search("graduate hiring", None, SearchParams::default())
        .await
        .unwrap();
    let options = RetrieveOptions {
        rerank_top_k: Some(3),
        ..Default::default()
    };
    let results = retriever.retrieve("graduate hiring", None, options).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results, fused[..3].to_vec());
    assert!(results.iter().all(|r| r.rerank.is_none()));
    assert_eq!(telemetry.stats().reranks_skipped, 1);

    // No explicit count: the fused list comes back whole, not cut to reranker.top_k
    let all = retriever
        .retrieve("graduate hiring", None, RetrieveOptions::default())
        .await
        .unwrap();
    assert!(fused.len() > retriever.reranker().top_k());
    assert_eq!(all, fused);
    assert_eq!(telemetry.stats().reranks_skipped, 2);
}

#[tokio::test]
async fn test_multi_query_without_reranker_returns_whole_pool() {
    let f = fixture(false);
    let queries = ["new graduate engineer", "graduate hiring engineers"];

    let results = f.retriever.retrieve_multi_query(&queries, None, None).await.unwrap();
    assert_eq!(results.len(), 6);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

    let capped = f.retriever.retrieve_multi_query(&queries, None, Some(2)).await.unwrap();
    assert_eq!(capped, results[..2].to_vec());
}

#[tokio::test]
async fn test_reranked_results_carry_scores_and_positions() {
    let f = fixture(true);
    assert!(f.retriever.has_reranker());

    let results = f
        .retriever
        .retrieve_by_type("new graduate engineer", ArticleCategory::Interview, Some(1))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let rerank = results[0].rerank.expect("reranked result");
    assert_eq!(rerank.position, 1);
    assert!(rerank.normalized > 0.0 && rerank.normalized < 1.0);
    // Doc 1 contains "new", "graduate" and "engineer"
    assert_eq!(results[0].id(), Some(DocumentId::Num(1)));
}

#[tokio::test]
async fn test_multi_query_dedups_by_id() {
    let f = fixture(true);
    let queries = ["new graduate engineer", "graduate hiring engineers"];
    let results = f.retriever.retrieve_multi_query(&queries, None, Some(10)).await.unwrap();

    let ids: Vec<_> = results.iter().filter_map(|r| r.id()).collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(ids.len(), 6);
}

#[tokio::test]
async fn test_multi_query_reranks_against_first_query() {
    let f = fixture(true);
    let queries = ["summer internship", "career fair", "remote work"];
    f.retriever.retrieve_multi_query(&queries, None, None).await.unwrap();

    let seen = f.scorer.queries.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|q| q == "summer internship"));
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_inputs_make_no_backend_calls() {
    let f = fixture(true);
    let none: [&str; 0] = [];

    let results = f.retriever.retrieve_multi_query(&none, None, None).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(f.embedder.calls.load(Ordering::SeqCst), 0);

    let reranked = f.retriever.reranker().rerank("query", Vec::new(), None).await.unwrap();
    assert!(reranked.is_empty());
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retrieve_all_types_covers_every_category() {
    let f = fixture(true);
    let by_type = f.retriever.retrieve_all_types("engineer event", None).await.unwrap();

    assert_eq!(by_type.len(), ArticleCategory::ALL.len());
    for (category, results) in &by_type {
        assert!(results.len() <= 3);
        assert!(results.iter().all(|r| r.document.category == *category));
    }
    assert_eq!(by_type[&ArticleCategory::EventReport].len(), 2);
}

#[tokio::test]
async fn test_fused_results_report_matching_methods() {
    let f = fixture(false);
    let results = f
        .retriever
        .searcher()
        .search("summer internship hackathon", None, SearchParams::default())
        .await
        .unwrap();

    let top = &results[0];
    assert_eq!(top.id(), Some(DocumentId::Num(3)));
    assert_eq!(top.matched_sources, vec![SearchSource::Vector, SearchSource::Lexical]);
    assert!(results.iter().skip(1).any(|r| r.matched_sources == vec![SearchSource::Vector]));
}

#[test]
fn test_unknown_category_rejected_before_querying() {
    let err = "PRESS_RELEASE".parse::<ArticleCategory>().unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidCategory(_)));
    assert_eq!("event-report".parse::<ArticleCategory>().unwrap(), ArticleCategory::EventReport);
}

/// First handle drops the connection once; later handles are healthy
struct DroppingConnector {
    connects: AtomicUsize,
}

struct DroppedStore;

#[async_trait]
impl DocumentStore for DroppedStore {
    async fn vector_search(&self, _: &[f32], _: Option<ArticleCategory>, _: usize) -> Result<Vec<VectorHit>> {
        Err(RetrievalError::StoreConnection("server closed the connection".into()))
    }

    async fn lexical_search(&self, _: &str, _: Option<ArticleCategory>, _: f32, _: usize) -> Result<Vec<LexicalHit>> {
        Err(RetrievalError::StoreConnection("server closed the connection".into()))
    }
}

#[async_trait]
impl StoreConnector for DroppingConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        if self.connects.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Arc::new(DroppedStore))
        } else {
            Ok(common::corpus_store())
        }
    }
}

#[tokio::test]
async fn test_search_survives_dropped_store_connection() {
    let telemetry = TelemetryCollector::new();
    let store = ReconnectingStore::new(DroppingConnector {
        connects: AtomicUsize::new(0),
    })
    .with_telemetry(telemetry.clone());

    let searcher = HybridSearcher::new(Arc::new(HistogramEmbedder::default()), Arc::new(store), SearchConfig::default());
    let results = searcher.search("career fair", None, SearchParams::default()).await.unwrap();

    assert!(!results.is_empty());
    assert_eq!(telemetry.stats().reconnects, 1);
}
