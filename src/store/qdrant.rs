//! Qdrant-backed document and style stores
//!
//! Collections use Euclid distance, so the point score Qdrant returns is
//! the L2 distance itself. Lexical search scrolls the (filtered) payloads
//! and scores trigram similarity in process, so each lexical query costs
//! one full scroll of the filtered collection. Payload layout per point:
//! `content`, `category`, `source_file`, `chunk_index`, `total_chunks`,
//! everything else is surfaced as document metadata.
#![allow(deprecated)]

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        point_id::PointIdOptions, value::Kind, with_payload_selector::SelectorOptions, Condition,
        FieldCondition, Filter, Match, PointId, ScoredPoint, ScrollPoints, SearchPoints, Value as QdrantValue,
        WithPayloadSelector,
    },
};
use serde_json::Value as JsonValue;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use tonic::Code;

use crate::config::StoreConfig;
use crate::errors::{Result, RetrievalError};
use crate::store::similarity::{set_similarity, trigrams};
use crate::store::style::{StyleExcerpt, StyleStore};
use crate::store::{
    sort_lexical_hits, sort_vector_hits, DocumentStore, LexicalHit, StoreConnector, VectorHit,
};
use crate::types::{ArticleCategory, Document, DocumentId};

const RESERVED_KEYS: [&str; 5] = ["content", "category", "source_file", "chunk_index", "total_chunks"];

type TrigramSet = HashSet<[char; 3]>;

/// Trigram sets per point id, recomputed when the stored content changes
#[derive(Default)]
struct TrigramCache {
    entries: RwLock<HashMap<DocumentId, (u64, Arc<TrigramSet>)>>,
}

impl TrigramCache {
    fn get_or_compute(&self, document: &Document) -> Arc<TrigramSet> {
        let Some(id) = document.id else {
            return Arc::new(trigrams(&document.content));
        };
        let fingerprint = content_fingerprint(&document.content);

        if let Some((cached, set)) = self.entries.read().unwrap_or_else(|p| p.into_inner()).get(&id) {
            if *cached == fingerprint {
                return Arc::clone(set);
            }
        }

        let set = Arc::new(trigrams(&document.content));
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, (fingerprint, Arc::clone(&set)));
        set
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

fn content_fingerprint(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Document store over a Qdrant collection
///
/// Lexical search is O(N) in the filtered collection size: every query
/// scrolls all matching payloads over the network. Trigram sets are cached
/// per point id, so repeat queries only pay for the transfer.
pub struct QdrantStore {
    client: QdrantClient,
    collection: String,
    style_collection: String,
    page_size: u32,
    trigram_cache: TrigramCache,
}

impl QdrantStore {
    /// Connect and verify the server answers
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = QdrantClient::from_url(&config.url)
            .build()
            .map_err(|e| RetrievalError::StoreConnection(format!("Failed to create Qdrant client: {}", e)))?;

        client
            .health_check()
            .await
            .map_err(|e| RetrievalError::StoreConnection(format!("Qdrant health check failed: {}", e)))?;

        tracing::debug!(url = %config.url, collection = %config.collection, "connected to qdrant");

        Ok(Self {
            client,
            collection: config.collection.clone(),
            style_collection: config.style_collection.clone(),
            page_size: config.scroll_page_size.max(1),
            trigram_cache: TrigramCache::default(),
        })
    }

    /// Number of points in the document collection
    pub async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(classify_error)?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    /// Scroll every payload matching `filter`
    async fn scroll_all(&self, collection: &str, filter: Option<Filter>) -> Result<Vec<(Option<PointId>, HashMap<String, QdrantValue>)>> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let page = self
                .client
                .scroll(&ScrollPoints {
                    collection_name: collection.to_string(),
                    filter: filter.clone(),
                    offset: offset.clone(),
                    limit: Some(self.page_size),
                    with_payload: Some(payload_enabled()),
                    ..Default::default()
                })
                .await
                .map_err(classify_error)?;

            points.extend(page.result.into_iter().map(|p| (p.id, p.payload)));

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(points)
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    async fn vector_search(
        &self,
        embedding: &[f32],
        category: Option<ArticleCategory>,
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: embedding.to_vec(),
                limit: k as u64,
                with_payload: Some(payload_enabled()),
                filter: category.map(category_filter),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        Ok(to_vector_hits(response.result))
    }

    async fn lexical_search(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<LexicalHit>> {
        let query_trigrams = trigrams(query);
        let points = self
            .scroll_all(&self.collection, category.map(category_filter))
            .await?;

        let mut hits: Vec<LexicalHit> = points
            .into_iter()
            .filter_map(|(id, payload)| to_document(id.as_ref(), payload))
            .filter_map(|document| {
                let similarity = set_similarity(&query_trigrams, &self.trigram_cache.get_or_compute(&document));
                (similarity > threshold).then(|| LexicalHit { document, similarity })
            })
            .collect();

        sort_lexical_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl StyleStore for QdrantStore {
    async fn profile(&self, category: ArticleCategory) -> Result<Option<String>> {
        let filter = keyword_filter(&[("category", category.as_str()), ("profile_type", "profile")]);
        let page = self
            .client
            .scroll(&ScrollPoints {
                collection_name: self.style_collection.clone(),
                filter: Some(filter),
                limit: Some(1),
                with_payload: Some(payload_enabled()),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        Ok(page
            .result
            .into_iter()
            .next()
            .and_then(|point| point.payload.get("content").and_then(value_to_string)))
    }

    async fn excerpts(&self, embedding: &[f32], category: ArticleCategory, k: usize) -> Result<Vec<StyleExcerpt>> {
        let filter = keyword_filter(&[("category", category.as_str()), ("profile_type", "excerpt")]);
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.style_collection.clone(),
                vector: embedding.to_vec(),
                limit: k as u64,
                with_payload: Some(payload_enabled()),
                filter: Some(filter),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                point.payload.get("content").and_then(value_to_string).map(|content| StyleExcerpt {
                    content,
                    distance: point.score,
                })
            })
            .collect())
    }
}

/// Opens [`QdrantStore`] handles for [`crate::store::ReconnectingStore`]
pub struct QdrantConnector {
    config: StoreConfig,
}

impl QdrantConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for QdrantConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(QdrantStore::connect(&self.config).await?))
    }
}

// Helper functions for filters and payload conversion

fn payload_enabled() -> WithPayloadSelector {
    WithPayloadSelector {
        selector_options: Some(SelectorOptions::Enable(true)),
    }
}

fn keyword_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(value.to_string())),
            }),
            ..Default::default()
        })),
    }
}

fn keyword_filter(pairs: &[(&str, &str)]) -> Filter {
    Filter {
        must: pairs.iter().map(|(k, v)| keyword_condition(k, v)).collect(),
        ..Default::default()
    }
}

fn category_filter(category: ArticleCategory) -> Filter {
    keyword_filter(&[("category", category.as_str())])
}

/// Transport-level failures are transient; everything else is a query error
///
/// The gRPC status code decides when the error carries one. Message
/// matching only covers errors raised before a request reached the server.
fn classify_error(err: anyhow::Error) -> RetrievalError {
    let message = format!("{:#}", err);
    let transient = match err.downcast_ref::<tonic::Status>() {
        Some(status) => is_transient_code(status.code()),
        None => {
            let lowered = message.to_lowercase();
            ["transport", "connection refused", "broken pipe", "timed out"]
                .iter()
                .any(|needle| lowered.contains(needle))
        }
    };

    if transient {
        RetrievalError::StoreConnection(message)
    } else {
        RetrievalError::StoreQuery(message)
    }
}

fn is_transient_code(code: Code) -> bool {
    matches!(code, Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled)
}

/// Points to hits; server order leaves equal distances untied
fn to_vector_hits(points: Vec<ScoredPoint>) -> Vec<VectorHit> {
    let mut hits: Vec<VectorHit> = points
        .into_iter()
        .filter_map(|point| {
            to_document(point.id.as_ref(), point.payload).map(|document| VectorHit {
                document,
                distance: point.score,
            })
        })
        .collect();

    sort_vector_hits(&mut hits);
    hits
}

fn point_id_to_document_id(point_id: Option<&PointId>) -> Option<DocumentId> {
    match point_id?.point_id_options.as_ref()? {
        PointIdOptions::Num(n) => Some(DocumentId::Num(*n)),
        PointIdOptions::Uuid(u) => uuid::Uuid::parse_str(u).ok().map(DocumentId::Uuid),
    }
}

/// Build a document from a point; rows with unusable content or an
/// unknown category are skipped
fn to_document(point_id: Option<&PointId>, payload: HashMap<String, QdrantValue>) -> Option<Document> {
    let content = payload.get("content").and_then(value_to_string)?;

    let label = payload.get("category").and_then(value_to_string).unwrap_or_default();
    let category = match label.parse::<ArticleCategory>() {
        Ok(category) => category,
        Err(_) => {
            tracing::warn!(category = %label, "skipping point with unrecognised category");
            return None;
        }
    };

    let as_u32 = |key: &str| {
        payload
            .get(key)
            .and_then(value_to_json)
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
    };

    let mut metadata = serde_json::Map::new();
    for (key, value) in &payload {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(json) = value_to_json(value) {
            metadata.insert(key.clone(), json);
        }
    }

    Some(Document {
        id: point_id_to_document_id(point_id),
        content,
        category,
        source_file: payload.get("source_file").and_then(value_to_string).unwrap_or_default(),
        chunk_index: as_u32("chunk_index").unwrap_or(0),
        total_chunks: as_u32("total_chunks").unwrap_or(1),
        metadata,
    })
}

fn value_to_string(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn value_to_json(value: &QdrantValue) -> Option<JsonValue> {
    match value.kind.as_ref()? {
        Kind::NullValue(_) => Some(JsonValue::Null),
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::ListValue(list) => Some(JsonValue::Array(list.values.iter().filter_map(value_to_json).collect())),
        Kind::StructValue(object) => Some(JsonValue::Object(
            object
                .fields
                .iter()
                .filter_map(|(k, v)| value_to_json(v).map(|json| (k.clone(), json)))
                .collect(),
        )),
    }
}
