//! Core document types shared by search, rerank and the retrievers

pub mod document;

pub use document::{
    ArticleCategory, Document, DocumentId, DocumentRecord, RerankScore, ScoredDocument, SearchSource,
};
