//! Shared fixtures: a deterministic embedder, scripted scorer and a small corpus

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use recruitrag::config::SearchConfig;
use recruitrag::embedding::Embedder;
use recruitrag::rerank::{CrossEncoderReranker, NoOpReranker, PairScorer, PairScores, Reranker};
use recruitrag::search::HybridSearcher;
use recruitrag::store::InMemoryStore;
use recruitrag::types::{ArticleCategory, Document, DocumentId, DocumentRecord};
use recruitrag::{ArticleRetriever, Result};

/// Normalized letter histogram; similar spelling lands close in L2
pub fn letter_histogram(text: &str) -> Vec<f32> {
    let mut counts = vec![0.0f32; 26];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        counts[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    let norm = counts.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm > 0.0 {
        counts.iter_mut().for_each(|c| *c /= norm);
    }
    counts
}

#[derive(Default)]
pub struct HistogramEmbedder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Embedder for HistogramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(letter_histogram(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_histogram(t)).collect())
    }
}

/// Scores a pair by how many query words the document contains
#[derive(Default)]
pub struct WordOverlapScorer {
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl PairScorer for WordOverlapScorer {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<PairScores> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut seen = self.queries.lock().unwrap();

        let scores: Vec<f32> = pairs
            .iter()
            .map(|(query, doc)| {
                seen.push(query.clone());
                let doc = doc.to_lowercase();
                let hits = query
                    .to_lowercase()
                    .split_whitespace()
                    .filter(|w| doc.contains(w))
                    .count();
                hits as f32 * 2.0 - 1.0
            })
            .collect();

        if scores.len() == 1 {
            Ok(PairScores::Single(scores[0]))
        } else {
            Ok(PairScores::Batch(scores))
        }
    }

    fn model_name(&self) -> &str {
        "word-overlap"
    }
}

pub const CORPUS: &[(u64, ArticleCategory, &str)] = &[
    (1, ArticleCategory::Interview, "Interview with a backend engineer who joined as a new graduate"),
    (2, ArticleCategory::Interview, "Interview with our head of design about hiring designers"),
    (3, ArticleCategory::EventReport, "Event report from the summer internship hackathon"),
    (4, ArticleCategory::Announcement, "Announcement: new graduate hiring opens for engineers"),
    (5, ArticleCategory::Culture, "Culture at the office: remote work and team lunches"),
    (6, ArticleCategory::EventReport, "Report on the engineering career fair event"),
];

pub fn corpus_store() -> Arc<InMemoryStore> {
    let records = CORPUS.iter().map(|(id, category, content)| DocumentRecord {
        document: Document::new(Some(DocumentId::Num(*id)), *content, *category)
            .with_source(format!("articles/{}.md", id), 0, 1),
        embedding: letter_histogram(content),
    });
    Arc::new(InMemoryStore::from_records(records))
}

pub struct Fixture {
    pub embedder: Arc<HistogramEmbedder>,
    pub scorer: Arc<WordOverlapScorer>,
    pub retriever: ArticleRetriever,
}

/// Retriever over the corpus; `with_reranker` selects cross-encoder vs passthrough
pub fn fixture(with_reranker: bool) -> Fixture {
    let embedder = Arc::new(HistogramEmbedder::default());
    let scorer = Arc::new(WordOverlapScorer::default());

    let searcher = HybridSearcher::new(embedder.clone(), corpus_store(), SearchConfig::default());
    let reranker = if with_reranker {
        Reranker::from(CrossEncoderReranker::new(scorer.clone(), 5))
    } else {
        Reranker::from(NoOpReranker::new(5))
    };

    Fixture {
        embedder,
        scorer,
        retriever: ArticleRetriever::new(searcher, reranker),
    }
}
