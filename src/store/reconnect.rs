//! Long-lived store handle with reconnect-and-retry-once
//!
//! The handle is acquired lazily and reused across calls. A transient
//! connection error drops the handle, opens a fresh one and replays the
//! query exactly once; a second failure is returned to the caller.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::errors::{Result, RetrievalError};
use crate::store::{DocumentStore, LexicalHit, StoreConnector, VectorHit};
use crate::telemetry::{emit, RetrievalEvent, TelemetryCollector};
use crate::types::ArticleCategory;

pub struct ReconnectingStore<C: StoreConnector> {
    connector: C,
    current: Mutex<Option<Arc<dyn DocumentStore>>>,
    telemetry: Option<TelemetryCollector>,
}

impl<C: StoreConnector> ReconnectingStore<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            current: Mutex::new(None),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Reuse the open handle or open one
    async fn acquire(&self) -> Result<Arc<dyn DocumentStore>> {
        let mut current = self.current.lock().await;
        if let Some(store) = current.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store = self.connector.connect().await?;
        *current = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Replace the `failed` handle after `cause`
    ///
    /// A concurrent caller may already have swapped in a fresh handle; that
    /// one is reused instead of reconnecting twice.
    async fn reconnect(&self, failed: &Arc<dyn DocumentStore>, cause: &RetrievalError) -> Result<Arc<dyn DocumentStore>> {
        let mut current = self.current.lock().await;
        if let Some(store) = current.as_ref() {
            if !Arc::ptr_eq(store, failed) {
                return Ok(Arc::clone(store));
            }
        }

        tracing::warn!(error = %cause, "document store connection lost, reconnecting");
        current.take();

        match self.connector.connect().await {
            Ok(store) => {
                emit(&self.telemetry, RetrievalEvent::StoreReconnect { success: true, timestamp: Instant::now() });
                *current = Some(Arc::clone(&store));
                Ok(store)
            }
            Err(e) => {
                emit(&self.telemetry, RetrievalEvent::StoreReconnect { success: false, timestamp: Instant::now() });
                tracing::error!(error = %e, "document store reconnect failed");
                Err(e)
            }
        }
    }

    /// Whether a handle is currently held
    pub async fn is_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Drop the held handle; the next query reconnects
    pub async fn close(&self) {
        self.current.lock().await.take();
    }
}

#[async_trait]
impl<C: StoreConnector> DocumentStore for ReconnectingStore<C> {
    async fn vector_search(
        &self,
        embedding: &[f32],
        category: Option<ArticleCategory>,
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        let store = self.acquire().await?;
        match store.vector_search(embedding, category, k).await {
            Err(e) if e.is_transient() => {
                let store = self.reconnect(&store, &e).await?;
                store.vector_search(embedding, category, k).await
            }
            other => other,
        }
    }

    async fn lexical_search(
        &self,
        query: &str,
        category: Option<ArticleCategory>,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<LexicalHit>> {
        let store = self.acquire().await?;
        match store.lexical_search(query, category, threshold, k).await {
            Err(e) if e.is_transient() => {
                let store = self.reconnect(&store, &e).await?;
                store.lexical_search(query, category, threshold, k).await
            }
            other => other,
        }
    }
}
