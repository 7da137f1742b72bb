//! Telemetry for the retrieval core
//!
//! In-process event collection for observability and tests. Log output
//! goes through `tracing`; this collector keeps the structured history.
//! Only the most recent events are retained; counters cover everything.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Retrieval telemetry events
#[derive(Debug, Clone)]
pub enum RetrievalEvent {
    /// A fused search finished
    SearchCompleted {
        vector_hits: usize,
        lexical_hits: usize,
        fused: usize,
        duration_ms: u64,
        timestamp: Instant,
    },
    EmbeddingFailed {
        reason: String,
        timestamp: Instant,
    },
    /// Embedding failed and the lexical list was fused alone
    LexicalFallback {
        lexical_hits: usize,
        timestamp: Instant,
    },
    RerankApplied {
        candidates: usize,
        returned: usize,
        duration_ms: u64,
        timestamp: Instant,
    },
    /// Reranking requested but the passthrough variant is active
    RerankSkipped {
        candidates: usize,
        timestamp: Instant,
    },
    RerankTimedOut {
        timeout_ms: u64,
        timestamp: Instant,
    },
    StoreReconnect {
        success: bool,
        timestamp: Instant,
    },
}

/// Aggregated counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalStats {
    pub searches: usize,
    pub embedding_failures: usize,
    pub lexical_fallbacks: usize,
    pub reranks_applied: usize,
    pub reranks_skipped: usize,
    pub rerank_timeouts: usize,
    pub reconnects: usize,
    pub reconnect_failures: usize,
}

/// Events kept by [`TelemetryCollector::new`]
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<RetrievalEvent>>>,
    stats: Arc<Mutex<RetrievalStats>>,
    max_events: usize,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Collector retaining at most `max_events` events, oldest evicted first
    pub fn with_capacity(max_events: usize) -> Self {
        let max_events = max_events.max(1);
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(DEFAULT_MAX_EVENTS)))),
            stats: Arc::new(Mutex::new(RetrievalStats::default())),
            max_events,
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: RetrievalEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                RetrievalEvent::SearchCompleted { .. } => stats.searches += 1,
                RetrievalEvent::EmbeddingFailed { .. } => stats.embedding_failures += 1,
                RetrievalEvent::LexicalFallback { .. } => stats.lexical_fallbacks += 1,
                RetrievalEvent::RerankApplied { .. } => stats.reranks_applied += 1,
                RetrievalEvent::RerankSkipped { .. } => stats.reranks_skipped += 1,
                RetrievalEvent::RerankTimedOut { .. } => stats.rerank_timeouts += 1,
                RetrievalEvent::StoreReconnect { success, .. } => {
                    if *success {
                        stats.reconnects += 1;
                    } else {
                        stats.reconnect_failures += 1;
                    }
                }
            }
        }

        let mut events = lock(&self.events);
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Get current statistics
    pub fn stats(&self) -> RetrievalStats {
        lock(&self.stats).clone()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<RetrievalEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
        *lock(&self.stats) = RetrievalStats::default();
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Record into an optional collector
pub(crate) fn emit(collector: &Option<TelemetryCollector>, event: RetrievalEvent) {
    if let Some(collector) = collector {
        collector.record(event);
    }
}
