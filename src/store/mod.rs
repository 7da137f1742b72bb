//! Document store query surface
//!
//! Stores answer two independent, read-only queries: L2 vector ranking and
//! trigram similarity ranking, both with an optional category filter.
//! Ingestion owns writes; nothing here mutates stored documents.

pub mod memory;
pub mod qdrant;
pub mod reconnect;
pub mod similarity;
pub mod style;

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::errors::Result;
use crate::types::{ArticleCategory, Document};

pub use memory::InMemoryStore;
pub use qdrant::{QdrantConnector, QdrantStore};
pub use reconnect::ReconnectingStore;
pub use style::{InMemoryStyleStore, StyleExcerpt, StyleStore};

/// Vector search result; smaller distance is closer
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub document: Document,
    pub distance: f32,
}

/// Lexical search result; larger similarity is closer
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub document: Document,
    pub similarity: f32,
}

/// Read-only query surface over the document collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `k` documents by ascending L2 distance to `embedding`
    async fn vector_search(
        &self,
        embedding: &[f32],
        category: Option<ArticleCategory>,
        k: usize,
    ) -> Result<Vec<VectorHit>>;

    /// Up to `k` documents with trigram similarity strictly above
    /// `threshold`, by descending similarity
    async fn lexical_search(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<LexicalHit>>;
}

/// Opens store handles; used by [`ReconnectingStore`]
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>>;
}

/// Ascending by score, ties by document id
pub(crate) fn order_ascending(a: f32, b: f32, a_doc: &Document, b_doc: &Document) -> Ordering {
    a.total_cmp(&b).then_with(|| a_doc.id.cmp(&b_doc.id))
}

/// Descending by score, ties by document id
pub(crate) fn order_descending(a: f32, b: f32, a_doc: &Document, b_doc: &Document) -> Ordering {
    b.total_cmp(&a).then_with(|| a_doc.id.cmp(&b_doc.id))
}

pub(crate) fn sort_vector_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| order_ascending(a.distance, b.distance, &a.document, &b.document));
}

pub(crate) fn sort_lexical_hits(hits: &mut [LexicalHit]) {
    hits.sort_by(|a, b| order_descending(a.similarity, b.similarity, &a.document, &b.document));
}
