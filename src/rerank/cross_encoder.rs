//! Cross-encoder reranker
//!
//! All candidate pairs go to the backend in a single batch on the blocking
//! pool; results are sorted once by raw logit, truncated, and annotated with
//! raw score, sigmoid-normalized score and 1-based position.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RerankerConfig;
use crate::errors::{Result, RetrievalError};
use crate::rerank::backend::CandleScorer;
use crate::rerank::{sigmoid, PairScore, PairScorer};
use crate::telemetry::{emit, RetrievalEvent, TelemetryCollector};
use crate::types::{RerankScore, ScoredDocument};

pub struct CrossEncoderReranker {
    scorer: Arc<dyn PairScorer>,
    top_k: usize,
    timeout: Option<Duration>,
    telemetry: Option<TelemetryCollector>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn PairScorer>, top_k: usize) -> Self {
        Self {
            scorer,
            top_k,
            timeout: None,
            telemetry: None,
        }
    }

    /// Load the configured model through the candle backend
    pub fn load(config: &RerankerConfig) -> Result<Self> {
        let scorer = CandleScorer::load(&config.model, config.max_length, config.use_fp16)?;
        tracing::info!(model = %config.model, "initialized cross-encoder reranker");

        let reranker = Self::new(Arc::new(scorer), config.top_k);
        Ok(match config.timeout_ms {
            Some(ms) => reranker.with_timeout(Duration::from_millis(ms)),
            None => reranker,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn model_name(&self) -> &str {
        self.scorer.model_name()
    }

    /// Rerank and keep the best `top_k`
    ///
    /// On timeout the candidates come back in their incoming order,
    /// truncated, without rerank annotations.
    pub async fn rerank(
        &self,
        query: &str,
        mut documents: Vec<ScoredDocument>,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        let top_k = top_k.unwrap_or(self.top_k);
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let candidates = documents.len();
        let raw = match self.score(query, &documents).await? {
            Some(raw) => raw,
            None => {
                documents.truncate(top_k);
                return Ok(documents);
            }
        };

        let mut scored: Vec<(f32, ScoredDocument)> = raw.into_iter().zip(documents).collect();
        // Stable sort keeps incoming order among equal logits
        scored.sort_by(|a, b| sanitize(b.0).total_cmp(&sanitize(a.0)));

        let reranked: Vec<ScoredDocument> = scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (raw, mut document))| {
                document.rerank = Some(RerankScore {
                    raw,
                    normalized: sigmoid(raw),
                    position: i + 1,
                });
                document
            })
            .collect();

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(candidates, returned = reranked.len(), duration_ms, "reranked candidates");
        emit(
            &self.telemetry,
            RetrievalEvent::RerankApplied {
                candidates,
                returned: reranked.len(),
                duration_ms,
                timestamp: Instant::now(),
            },
        );

        Ok(reranked)
    }

    /// Scores in input order, no sorting or truncation
    pub async fn compute_scores(&self, query: &str, documents: Vec<ScoredDocument>) -> Result<Vec<PairScore>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self.score(query, &documents).await?.ok_or(RetrievalError::Timeout {
            duration_ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
        })?;

        Ok(raw
            .into_iter()
            .zip(documents)
            .map(|(raw, document)| PairScore {
                document,
                raw,
                normalized: sigmoid(raw),
            })
            .collect())
    }

    /// One backend call for all pairs; `None` when the timeout expired
    async fn score(&self, query: &str, documents: &[ScoredDocument]) -> Result<Option<Vec<f32>>> {
        let pairs: Vec<(String, String)> = documents
            .iter()
            .map(|d| (query.to_string(), d.content().to_string()))
            .collect();

        let scorer = Arc::clone(&self.scorer);
        let task = tokio::task::spawn_blocking(move || scorer.score_pairs(&pairs));

        let joined = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    let timeout_ms = timeout.as_millis() as u64;
                    tracing::warn!(timeout_ms, "reranking timed out, keeping fused order");
                    emit(
                        &self.telemetry,
                        RetrievalEvent::RerankTimedOut {
                            timeout_ms,
                            timestamp: Instant::now(),
                        },
                    );
                    return Ok(None);
                }
            },
            None => task.await,
        };

        let scores = joined
            .map_err(|e| RetrievalError::RerankFailed(format!("Scoring task failed: {}", e)))??
            .into_vec();

        if scores.len() != documents.len() {
            return Err(RetrievalError::RerankFailed(format!(
                "Backend returned {} scores for {} pairs",
                scores.len(),
                documents.len()
            )));
        }

        Ok(Some(scores))
    }
}

/// NaN and infinities sort last
#[inline]
fn sanitize(score: f32) -> f32 {
    if score.is_finite() {
        score
    } else {
        f32::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::PairScores;
    use crate::types::{ArticleCategory, Document, DocumentId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores a pair by the number embedded in the document text
    struct DigitScorer {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl DigitScorer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    impl PairScorer for DigitScorer {
        fn score_pairs(&self, pairs: &[(String, String)]) -> Result<PairScores> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let scores: Vec<f32> = pairs
                .iter()
                .map(|(_, doc)| doc.rsplit(' ').next().and_then(|n| n.parse().ok()).unwrap_or(0.0))
                .collect();
            if scores.len() == 1 {
                Ok(PairScores::Single(scores[0]))
            } else {
                Ok(PairScores::Batch(scores))
            }
        }

        fn model_name(&self) -> &str {
            "digit"
        }
    }

    struct FailingScorer;

    impl PairScorer for FailingScorer {
        fn score_pairs(&self, _pairs: &[(String, String)]) -> Result<PairScores> {
            Err(RetrievalError::RerankFailed("out of memory".into()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn doc(id: u64, score: f32) -> ScoredDocument {
        ScoredDocument::new(
            Document::new(Some(DocumentId::Num(id)), format!("article {}", score), ArticleCategory::Interview),
            0.01,
        )
    }

    #[tokio::test]
    async fn test_rerank_orders_by_raw_score() {
        let reranker = CrossEncoderReranker::new(Arc::new(DigitScorer::new()), 2);
        let result = reranker
            .rerank("q", vec![doc(1, -1.0), doc(2, 3.0), doc(3, 0.5)], None)
            .await
            .unwrap();

        let ids: Vec<_> = result.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![Some(DocumentId::Num(2)), Some(DocumentId::Num(3))]);

        let first = result[0].rerank.unwrap();
        assert_eq!(first.raw, 3.0);
        assert_eq!(first.position, 1);
        assert!((first.normalized - sigmoid(3.0)).abs() < 1e-6);
        assert_eq!(result[1].rerank.unwrap().position, 2);
    }

    #[tokio::test]
    async fn test_single_document_scalar_score() {
        let reranker = CrossEncoderReranker::new(Arc::new(DigitScorer::new()), 5);
        let result = reranker.rerank("q", vec![doc(7, 2.0)], None).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].rerank.unwrap().raw, 2.0);
    }

    #[tokio::test]
    async fn test_empty_input_skips_backend() {
        let scorer = Arc::new(DigitScorer::new());
        let reranker = CrossEncoderReranker::new(scorer.clone(), 5);
        assert!(reranker.rerank("q", Vec::new(), None).await.unwrap().is_empty());
        assert!(reranker.compute_scores("q", Vec::new()).await.unwrap().is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compute_scores_preserves_input_order() {
        let reranker = CrossEncoderReranker::new(Arc::new(DigitScorer::new()), 1);
        let scores = reranker.compute_scores("q", vec![doc(1, -2.0), doc(2, 4.0)]).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].raw, -2.0);
        assert_eq!(scores[1].raw, 4.0);
        assert!(scores[0].normalized < 0.5 && scores[1].normalized > 0.5);
    }

    #[tokio::test]
    async fn test_scoring_error_propagates() {
        let reranker = CrossEncoderReranker::new(Arc::new(FailingScorer), 5);
        let err = reranker.rerank("q", vec![doc(1, 1.0)], None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::RerankFailed(_)));
    }

    #[tokio::test]
    async fn test_timeout_keeps_fused_order() {
        let telemetry = TelemetryCollector::new();
        let scorer = DigitScorer {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_millis(300)),
        };
        let reranker = CrossEncoderReranker::new(Arc::new(scorer), 2)
            .with_timeout(Duration::from_millis(10))
            .with_telemetry(telemetry.clone());

        let result = reranker
            .rerank("q", vec![doc(1, -1.0), doc(2, 3.0), doc(3, 0.5)], None)
            .await
            .unwrap();

        let ids: Vec<_> = result.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![Some(DocumentId::Num(1)), Some(DocumentId::Num(2))]);
        assert!(result.iter().all(|d| d.rerank.is_none()));
        assert_eq!(telemetry.stats().rerank_timeouts, 1);
    }

    #[test]
    fn test_non_finite_scores_sort_last() {
        assert_eq!(sanitize(f32::NAN), f32::NEG_INFINITY);
        assert_eq!(sanitize(1.5), 1.5);
    }
}
