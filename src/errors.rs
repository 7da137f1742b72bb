//! Error types for recruitrag
//!
//! Search failures are never folded into empty result sets: an empty
//! `Vec` always means "searched, found nothing". Only reranker
//! unavailability is absorbed, and only at construction time.

use thiserror::Error;

/// Main error type for the retrieval core
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding backend unreachable or rejected the input
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailure(String),

    /// Transient loss of the document-store connection
    #[error("Document store connection error: {0}")]
    StoreConnection(String),

    /// Store answered but the query itself failed
    #[error("Document store query failed: {0}")]
    StoreQuery(String),

    /// Cross-encoder could not be constructed (missing weights/runtime)
    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    /// Cross-encoder was loaded but scoring failed
    #[error("Reranking failed: {0}")]
    RerankFailed(String),

    /// Unrecognised article category label
    #[error("Invalid article category: '{0}' (expected ANNOUNCEMENT, EVENT_REPORT, INTERVIEW or CULTURE)")]
    InvalidCategory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Retrieval error: {0}")]
    Generic(String),
}

impl RetrievalError {
    /// Whether the store-level reconnect-and-retry-once policy applies
    pub fn is_transient(&self) -> bool {
        matches!(self, RetrievalError::StoreConnection(_))
    }
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

impl From<anyhow::Error> for RetrievalError {
    fn from(err: anyhow::Error) -> Self {
        RetrievalError::Generic(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetrievalError::InvalidCategory("BLOG".to_string());
        assert!(err.to_string().contains("BLOG"));
        assert!(err.to_string().contains("INTERVIEW"));
    }

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(RetrievalError::StoreConnection("reset".into()).is_transient());
        assert!(!RetrievalError::StoreQuery("bad filter".into()).is_transient());
        assert!(!RetrievalError::EmbeddingFailure("503".into()).is_transient());
        assert!(!RetrievalError::Timeout { duration_ms: 10 }.is_transient());
    }

    #[test]
    fn test_anyhow_conversion_keeps_context_chain() {
        let err = anyhow::anyhow!("root cause").context("loading weights");
        let converted: RetrievalError = err.into();
        let message = converted.to_string();
        assert!(message.contains("loading weights"));
        assert!(message.contains("root cause"));
    }
}
