//! Doctor command for retrieval diagnostics
//!
//! Checks configuration, the embedding endpoint, the document store and
//! reranker availability.

use colored::Colorize;

use crate::config::RetrievalConfig;
use crate::embedding;
use crate::rerank::CrossEncoderReranker;
use crate::store::QdrantStore;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass(String),
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

pub struct Doctor {
    config: RetrievalConfig,
}

impl Doctor {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = vec![self.check_config()];
        checks.push(self.check_embedding().await);
        checks.push(self.check_store().await);
        checks.push(self.check_reranker().await);
        checks
    }

    fn check_config(&self) -> HealthCheck {
        match self.config.validate() {
            Ok(()) => HealthCheck::new("Configuration", HealthStatus::Pass("valid".to_string())),
            Err(e) => HealthCheck::new("Configuration", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_embedding(&self) -> HealthCheck {
        let embedder = match embedding::from_config(&self.config.embedding) {
            Ok(embedder) => embedder,
            Err(e) => return HealthCheck::new("Embedding", HealthStatus::Fail(e.to_string())),
        };

        match embedder.embed("health check").await {
            Ok(vector) => HealthCheck::new(
                "Embedding",
                HealthStatus::Pass(format!("{} ({} dims)", self.config.embedding.model, vector.len())),
            ),
            Err(e) => HealthCheck::new("Embedding", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_store(&self) -> HealthCheck {
        let store = match QdrantStore::connect(&self.config.store).await {
            Ok(store) => store,
            Err(e) => return HealthCheck::new("Document store", HealthStatus::Fail(e.to_string())),
        };

        match store.count().await {
            Ok(0) => HealthCheck::new(
                "Document store",
                HealthStatus::Warn(format!("collection '{}' is empty", self.config.store.collection)),
            ),
            Ok(n) => HealthCheck::new("Document store", HealthStatus::Pass(format!("{} documents", n))),
            Err(e) => HealthCheck::new("Document store", HealthStatus::Fail(e.to_string())),
        }
    }

    /// Unavailable reranker is a warning: retrieval degrades to fused order
    async fn check_reranker(&self) -> HealthCheck {
        if !self.config.reranker.enabled {
            return HealthCheck::new("Reranker", HealthStatus::Warn("disabled".to_string()));
        }

        let config = self.config.reranker.clone();
        let loaded = tokio::task::spawn_blocking(move || CrossEncoderReranker::load(&config)).await;

        match loaded {
            Ok(Ok(reranker)) => HealthCheck::new("Reranker", HealthStatus::Pass(reranker.model_name().to_string())),
            Ok(Err(e)) => HealthCheck::new("Reranker", HealthStatus::Warn(format!("{}; using passthrough", e))),
            Err(e) => HealthCheck::new("Reranker", HealthStatus::Warn(format!("load task failed: {}", e))),
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "Retrieval Diagnostics".bold());
        println!("{:<16} Status", "Check");
        println!("{}", "=".repeat(60));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass(msg) => format!("{} {}", "PASS".green(), msg),
                HealthStatus::Warn(msg) => format!("{} {}", "WARN".yellow(), msg),
                HealthStatus::Fail(msg) => format!("{} {}", "FAIL".red(), msg),
            };
            println!("{:<16} {}", check.name, status);
        }

        println!();
    }

    /// Healthy unless some check failed
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}
