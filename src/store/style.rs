//! Style profile storage
//!
//! Each category has at most one writing-rules profile plus any number of
//! embedded sample excerpts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{Result, RetrievalError};
use crate::store::similarity::l2_distance;
use crate::types::ArticleCategory;

/// Excerpt returned by vector search, smaller distance is closer
#[derive(Debug, Clone, PartialEq)]
pub struct StyleExcerpt {
    pub content: String,
    pub distance: f32,
}

#[async_trait]
pub trait StyleStore: Send + Sync {
    /// Writing-rules profile for the category, if one was seeded
    async fn profile(&self, category: ArticleCategory) -> Result<Option<String>>;

    /// Up to `k` excerpts of the category by ascending L2 distance
    async fn excerpts(&self, embedding: &[f32], category: ArticleCategory, k: usize) -> Result<Vec<StyleExcerpt>>;
}

#[derive(Default)]
struct StyleEntries {
    profiles: HashMap<ArticleCategory, String>,
    excerpts: Vec<(ArticleCategory, String, Vec<f32>)>,
}

/// Style store held in process memory
#[derive(Default)]
pub struct InMemoryStyleStore {
    inner: RwLock<StyleEntries>,
}

impl InMemoryStyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the profile of a category
    pub fn set_profile(&self, category: ArticleCategory, content: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        inner.profiles.insert(category, content.into());
    }

    pub fn add_excerpt(&self, category: ArticleCategory, content: impl Into<String>, embedding: Vec<f32>) {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        inner.excerpts.push((category, content.into(), embedding));
    }
}

#[async_trait]
impl StyleStore for InMemoryStyleStore {
    async fn profile(&self, category: ArticleCategory) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        Ok(inner.profiles.get(&category).cloned())
    }

    async fn excerpts(&self, embedding: &[f32], category: ArticleCategory, k: usize) -> Result<Vec<StyleExcerpt>> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());

        let mut scored = Vec::new();
        for (_, content, stored) in inner.excerpts.iter().filter(|(c, _, _)| *c == category) {
            let distance = l2_distance(stored, embedding).ok_or_else(|| {
                RetrievalError::StoreQuery("Style excerpt embedding dimension mismatch".to_string())
            })?;
            scored.push(StyleExcerpt {
                content: content.clone(),
                distance,
            });
        }

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.content.cmp(&b.content)));
        scored.truncate(k);
        Ok(scored)
    }
}
