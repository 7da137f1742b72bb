//! In-memory document store
//!
//! Exact (brute-force) L2 and trigram ranking over a vector of records.
//! Suitable for tests and small corpora; trigram sets are computed once at
//! insertion.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard};

use crate::errors::{Result, RetrievalError};
use crate::store::similarity::{l2_distance, set_similarity, trigrams};
use crate::store::{sort_lexical_hits, sort_vector_hits, DocumentStore, LexicalHit, VectorHit};
use crate::types::{ArticleCategory, DocumentRecord};

struct Entry {
    record: DocumentRecord,
    trigrams: HashSet<[char; 3]>,
}

/// Brute-force store held in process memory
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let store = Self::new();
        store.extend(records);
        store
    }

    pub fn insert(&self, record: DocumentRecord) {
        self.extend(std::iter::once(record));
    }

    pub fn extend(&self, records: impl IntoIterator<Item = DocumentRecord>) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        for record in records {
            let trigrams = trigrams(&record.document.content);
            entries.push(Entry { record, trigrams });
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }
}

fn in_category(entry: &Entry, category: Option<ArticleCategory>) -> bool {
    category.map_or(true, |c| entry.record.document.category == c)
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn vector_search(
        &self,
        embedding: &[f32],
        category: Option<ArticleCategory>,
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        let entries = self.read();
        let mut hits = Vec::new();

        for entry in entries.iter().filter(|e| in_category(e, category)) {
            let distance = l2_distance(&entry.record.embedding, embedding).ok_or_else(|| {
                RetrievalError::StoreQuery(format!(
                    "Embedding dimension mismatch: stored {}, query {}",
                    entry.record.embedding.len(),
                    embedding.len()
                ))
            })?;
            hits.push(VectorHit {
                document: entry.record.document.clone(),
                distance,
            });
        }

        sort_vector_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn lexical_search(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<LexicalHit>> {
        let query_trigrams = trigrams(query);
        let entries = self.read();

        let mut hits: Vec<LexicalHit> = entries
            .iter()
            .filter(|e| in_category(e, category))
            .filter_map(|entry| {
                let similarity = set_similarity(&query_trigrams, &entry.trigrams);
                (similarity > threshold).then(|| LexicalHit {
                    document: entry.record.document.clone(),
                    similarity,
                })
            })
            .collect();

        sort_lexical_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }
}
