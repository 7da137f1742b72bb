//! recruitrag - hybrid retrieval core for recruiting articles
//!
//! Vector (L2) and trigram lexical search fused with Reciprocal Rank
//! Fusion, optionally reranked by a cross-encoder.
//!
//! # Architecture
//!
//! - **search**: first-stage vector + lexical search and RRF fusion
//! - **rerank**: cross-encoder reranker with passthrough fallback
//! - **retriever**: article and style-profile facades
//! - **store** / **embedding**: backends behind async traits

pub mod errors;
pub mod types;
pub mod config;
pub mod telemetry;

pub use errors::{Result, RetrievalError};

// Backends
pub mod embedding;
pub mod store;

// Retrieval pipeline
pub mod search;
pub mod rerank;
pub mod retriever;

pub use retriever::{ArticleRetriever, RetrieveOptions, StyleProfileRetriever};

// Binary support
pub mod cli;
pub mod doctor;
