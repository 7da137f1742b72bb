//! Document types shared by the search, rerank and retrieval layers
//!
//! Documents are produced by ingestion and are read-only here. A
//! `ScoredDocument` is the retrieval-time wrapper carrying whichever score
//! the producing stage assigned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{Result, RetrievalError};

/// Stable document identity assigned at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Num(u64),
    Uuid(Uuid),
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Num(n) => write!(f, "{}", n),
            DocumentId::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        DocumentId::Num(value)
    }
}

impl From<Uuid> for DocumentId {
    fn from(value: Uuid) -> Self {
        DocumentId::Uuid(value)
    }
}

/// Closed set of article categories used as hard filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleCategory {
    Announcement,
    EventReport,
    Interview,
    Culture,
}

impl ArticleCategory {
    /// Every category, in declaration order
    pub const ALL: [ArticleCategory; 4] = [
        ArticleCategory::Announcement,
        ArticleCategory::EventReport,
        ArticleCategory::Interview,
        ArticleCategory::Culture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Announcement => "ANNOUNCEMENT",
            Self::EventReport => "EVENT_REPORT",
            Self::Interview => "INTERVIEW",
            Self::Culture => "CULTURE",
        }
    }
}

impl fmt::Display for ArticleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleCategory {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ArticleCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| RetrievalError::InvalidCategory(s.to_string()))
    }
}

/// A searchable content chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// `None` when the row carried no usable identity; such documents are
    /// never merged or deduplicated against anything
    pub id: Option<DocumentId>,
    pub content: String,
    pub category: ArticleCategory,
    pub source_file: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Single-chunk document with empty provenance
    pub fn new(id: Option<DocumentId>, content: impl Into<String>, category: ArticleCategory) -> Self {
        Self {
            id,
            content: content.into(),
            category,
            source_file: String::new(),
            chunk_index: 0,
            total_chunks: 1,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_source(mut self, source_file: impl Into<String>, chunk_index: u32, total_chunks: u32) -> Self {
        self.source_file = source_file.into();
        self.chunk_index = chunk_index;
        self.total_chunks = total_chunks;
        self
    }
}

/// Document plus its embedding, as written by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Which first-stage method produced (or contributed to) a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Vector,
    Lexical,
}

/// Cross-encoder annotation attached by the reranker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    /// Raw model logit; ranking uses this value
    pub raw: f32,
    /// Sigmoid of `raw`, in (0, 1)
    pub normalized: f32,
    /// 1-indexed position after reranking
    pub position: usize,
}

/// Retrieval-time wrapper around a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    /// Stage-specific score, larger is better for fused results
    pub score: f64,
    #[serde(default)]
    pub matched_sources: Vec<SearchSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankScore>,
}

impl ScoredDocument {
    pub fn new(document: Document, score: f64) -> Self {
        Self {
            document,
            score,
            matched_sources: Vec::new(),
            rerank: None,
        }
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.document.id
    }

    pub fn content(&self) -> &str {
        &self.document.content
    }
}
