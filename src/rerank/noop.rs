//! Passthrough reranker

use crate::rerank::PairScore;
use crate::types::ScoredDocument;

/// Keeps fused order and truncates
#[derive(Debug, Clone, Copy)]
pub struct NoOpReranker {
    top_k: usize,
}

impl NoOpReranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn rerank(&self, _query: &str, mut documents: Vec<ScoredDocument>, top_k: Option<usize>) -> Vec<ScoredDocument> {
        documents.truncate(top_k.unwrap_or(self.top_k));
        documents
    }

    /// Neutral scores: raw 0.0, normalized 0.5
    pub fn compute_scores(&self, _query: &str, documents: Vec<ScoredDocument>) -> Vec<PairScore> {
        documents
            .into_iter()
            .map(|document| PairScore {
                document,
                raw: 0.0,
                normalized: 0.5,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArticleCategory, Document, DocumentId};

    fn docs(n: u64) -> Vec<ScoredDocument> {
        (1..=n)
            .map(|i| {
                ScoredDocument::new(
                    Document::new(Some(DocumentId::Num(i)), format!("doc {}", i), ArticleCategory::Culture),
                    1.0 / i as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_truncates_in_input_order() {
        let result = NoOpReranker::new(2).rerank("q", docs(4), None);
        let ids: Vec<_> = result.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![Some(DocumentId::Num(1)), Some(DocumentId::Num(2))]);
        assert!(result.iter().all(|d| d.rerank.is_none()));
    }

    #[test]
    fn test_explicit_top_k_wins() {
        assert_eq!(NoOpReranker::new(2).rerank("q", docs(4), Some(3)).len(), 3);
        assert!(NoOpReranker::new(2).rerank("q", Vec::new(), None).is_empty());
    }

    #[test]
    fn test_neutral_scores() {
        let scores = NoOpReranker::new(5).compute_scores("q", docs(2));
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.raw == 0.0 && s.normalized == 0.5));
    }
}
