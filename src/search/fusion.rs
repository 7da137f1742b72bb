//! Reciprocal Rank Fusion: score = Σ 1/(rrf_k + rank_i), ranks 1-indexed
//!
//! Vector distances and trigram similarities live on incomparable scales,
//! so only each document's rank within its own list is used. A document
//! found by both methods receives the sum of its two contributions.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::store::{LexicalHit, VectorHit};
use crate::types::{Document, DocumentId, ScoredDocument, SearchSource};

/// Contribution of a single 1-indexed rank
#[inline]
pub fn rrf_score(rank: usize, rrf_k: u32) -> f64 {
    1.0 / (f64::from(rrf_k) + rank as f64)
}

struct Fused {
    document: Document,
    score: f64,
    sources: Vec<SearchSource>,
    first_seen: usize,
}

/// Fuse independently ranked lists, each already in best-first order
///
/// Documents without an id are never merged with anything. Output is
/// ordered by descending fused score, then ascending id (id-less
/// documents last), then first appearance, and truncated to `limit`.
pub fn fuse_ranked(lists: Vec<(SearchSource, Vec<Document>)>, rrf_k: u32, limit: usize) -> Vec<ScoredDocument> {
    let mut fused: Vec<Fused> = Vec::new();
    let mut by_id: HashMap<DocumentId, usize> = HashMap::new();

    for (source, documents) in lists {
        for (index, document) in documents.into_iter().enumerate() {
            let contribution = rrf_score(index + 1, rrf_k);

            let existing = document.id.and_then(|id| by_id.get(&id).copied());
            match existing {
                Some(slot) => {
                    let entry = &mut fused[slot];
                    entry.score += contribution;
                    if !entry.sources.contains(&source) {
                        entry.sources.push(source);
                    }
                }
                None => {
                    if let Some(id) = document.id {
                        by_id.insert(id, fused.len());
                    }
                    let first_seen = fused.len();
                    fused.push(Fused {
                        document,
                        score: contribution,
                        sources: vec![source],
                        first_seen,
                    });
                }
            }
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| id_order(a.document.id, b.document.id))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
    fused.truncate(limit);

    fused
        .into_iter()
        .map(|f| {
            let mut sources = f.sources;
            sources.sort();
            ScoredDocument {
                document: f.document,
                score: f.score,
                matched_sources: sources,
                rerank: None,
            }
        })
        .collect()
}

/// Fuse the two first-stage result lists
pub fn fuse(vector: Vec<VectorHit>, lexical: Vec<LexicalHit>, rrf_k: u32, limit: usize) -> Vec<ScoredDocument> {
    fuse_ranked(
        vec![
            (SearchSource::Vector, vector.into_iter().map(|h| h.document).collect()),
            (SearchSource::Lexical, lexical.into_iter().map(|h| h.document).collect()),
        ],
        rrf_k,
        limit,
    )
}

fn id_order(a: Option<DocumentId>, b: Option<DocumentId>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
