//! Hybrid search over the chunk index.
//!
//! Semantic (cosine) and lexical (BM25) rankings are computed over the
//! filtered candidate set and fused with reciprocal rank fusion.

pub mod engine;
pub mod fusion;
pub mod lexical;

pub use engine::{HybridSearchEngine, SearchHit, SearchRequest};
