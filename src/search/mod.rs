//! First-stage retrieval: hybrid search and reciprocal rank fusion

pub mod fusion;
pub mod hybrid;

pub use fusion::{fuse, fuse_ranked, rrf_score};
pub use hybrid::{HybridSearcher, SearchParams};
