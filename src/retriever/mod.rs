//! Retrieval facades consumed by the generation pipeline

pub mod article;
pub mod style;

pub use article::{ArticleRetriever, RetrieveOptions, DEFAULT_TOP_K_PER_TYPE};
pub use style::{StyleProfileRetriever, DEFAULT_EXCERPT_TOP_K};
