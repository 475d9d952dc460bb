//! Core search pipeline: concurrent per-site retrieval, LLM-first offer
//! extraction with a structural fallback, relevance scoring with a
//! deterministic fallback, ranking, and streaming progress.

pub mod content;
pub mod extract;
pub mod fetch;
pub mod pool;
pub mod score;
pub mod search;
pub mod stream;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use extract::OfferExtractor;
pub use fetch::{HttpFetcher, PageFetcher};
pub use score::RelevanceScorer;
pub use search::SearchEngine;
