//! Second-stage reranking
//!
//! A cross-encoder scores each (query, document) pair jointly. When the
//! model cannot be loaded the passthrough variant keeps fused order and only
//! truncates, so callers hold one type whether or not a model loaded.

pub mod backend;
pub mod cross_encoder;
pub mod noop;

use crate::config::RerankerConfig;
use crate::errors::Result;
use crate::telemetry::TelemetryCollector;
use crate::types::ScoredDocument;

pub use backend::CandleScorer;
pub use cross_encoder::CrossEncoderReranker;
pub use noop::NoOpReranker;

/// Logistic function, maps any finite logit into the open interval (0, 1)
///
/// f32 saturates to exactly 0.0 or 1.0 for large |x|, so the result is
/// clamped to the nearest representable values inside the interval.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    (1.0 / (1.0 + (-x).exp())).clamp(f32::MIN_POSITIVE, 1.0 - f32::EPSILON)
}

/// Raw backend output; some backends return a bare scalar for one pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairScores {
    Single(f32),
    Batch(Vec<f32>),
}

impl PairScores {
    pub fn into_vec(self) -> Vec<f32> {
        match self {
            PairScores::Single(score) => vec![score],
            PairScores::Batch(scores) => scores,
        }
    }
}

/// Blocking cross-encoder backend
pub trait PairScorer: Send + Sync {
    /// Score every `(query, document)` pair in one pass
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<PairScores>;

    fn model_name(&self) -> &str;
}

/// Document with its raw and normalized cross-encoder scores
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub document: ScoredDocument,
    pub raw: f32,
    pub normalized: f32,
}

/// Active reranker: a loaded cross-encoder or the passthrough
pub enum Reranker {
    CrossEncoder(CrossEncoderReranker),
    NoOp(NoOpReranker),
}

impl Reranker {
    /// Load the configured cross-encoder; any failure degrades to passthrough
    pub fn load_or_noop(config: &RerankerConfig, telemetry: Option<TelemetryCollector>) -> Self {
        if !config.enabled {
            tracing::info!("reranker disabled by configuration");
            return Reranker::NoOp(NoOpReranker::new(config.top_k));
        }

        match CrossEncoderReranker::load(config) {
            Ok(reranker) => {
                let reranker = match telemetry {
                    Some(t) => reranker.with_telemetry(t),
                    None => reranker,
                };
                Reranker::CrossEncoder(reranker)
            }
            Err(e) => {
                tracing::warn!(error = %e, "reranker initialization failed, continuing without reranking");
                Reranker::NoOp(NoOpReranker::new(config.top_k))
            }
        }
    }

    /// Whether reranking actually reorders candidates
    pub fn is_active(&self) -> bool {
        matches!(self, Reranker::CrossEncoder(_))
    }

    pub fn top_k(&self) -> usize {
        match self {
            Reranker::CrossEncoder(r) => r.top_k(),
            Reranker::NoOp(r) => r.top_k(),
        }
    }

    /// Reorder by relevance to `query` and keep at most `top_k`
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<ScoredDocument>,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>> {
        match self {
            Reranker::CrossEncoder(r) => r.rerank(query, documents, top_k).await,
            Reranker::NoOp(r) => Ok(r.rerank(query, documents, top_k)),
        }
    }

    /// Scores for every document, in input order, without filtering
    pub async fn compute_scores(&self, query: &str, documents: Vec<ScoredDocument>) -> Result<Vec<PairScore>> {
        match self {
            Reranker::CrossEncoder(r) => r.compute_scores(query, documents).await,
            Reranker::NoOp(r) => Ok(r.compute_scores(query, documents)),
        }
    }
}

impl From<CrossEncoderReranker> for Reranker {
    fn from(reranker: CrossEncoderReranker) -> Self {
        Reranker::CrossEncoder(reranker)
    }
}

impl From<NoOpReranker> for Reranker {
    fn from(reranker: NoOpReranker) -> Self {
        Reranker::NoOp(reranker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_sigmoid_zero_is_half() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_saturates() {
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_sigmoid_stays_open_at_extremes() {
        for x in [20.0, -20.0, 200.0, -200.0, f32::MAX, f32::MIN] {
            let s = sigmoid(x);
            assert!(s > 0.0 && s < 1.0, "sigmoid({}) = {}", x, s);
        }
        assert!(sigmoid(200.0) > sigmoid(-200.0));
    }

    #[quickcheck]
    fn prop_sigmoid_strictly_inside_unit_interval(x: f32) -> bool {
        if !x.is_finite() {
            return true;
        }
        let s = sigmoid(x);
        s > 0.0 && s < 1.0
    }

    #[quickcheck]
    fn prop_sigmoid_symmetric(x: i16) -> bool {
        let x = f32::from(x) / 100.0;
        (sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-5
    }

    #[test]
    fn test_pair_scores_scalar_normalized() {
        assert_eq!(PairScores::Single(1.5).into_vec(), vec![1.5]);
        assert_eq!(PairScores::Batch(vec![1.0, 2.0]).into_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_disabled_config_yields_passthrough() {
        let config = RerankerConfig {
            enabled: false,
            ..Default::default()
        };
        let reranker = Reranker::load_or_noop(&config, None);
        assert!(!reranker.is_active());
        assert_eq!(reranker.top_k(), 5);
    }
}
