//! kb-retrieval library
//!
//! Retrieval pipeline for a project knowledge base: entity-aware chunking,
//! embedding-backed indexing with non-destructive versioning, and hybrid
//! (semantic + lexical) search with reciprocal rank fusion.
//!
//! # Modules
//!
//! - `core`: typed entity input, text extractors, content hashing
//! - `chunking`: overlapping window chunker
//! - `embedding`: provider trait and the deterministic HTP embedder
//! - `store`: SQLite chunk + version persistence
//! - `index`: indexing orchestration with change detection
//! - `search`: hybrid search engine
//! - `version`: KB version lifecycle and diffing

pub mod chunking;
pub mod core;
pub mod embedding;
pub mod error;
pub mod index;
pub mod search;
pub mod store;
pub mod version;

// Re-exports for convenience
pub use chunking::{Chunk, ChunkingConfig, ChunkingEngine};
pub use core::entity::EntityDoc;
pub use core::extract::{ExtractorRegistry, TextExtractor};
pub use core::hash::content_hash;
pub use embedding::{EmbeddingProvider, HtpEmbedder};
pub use error::{KbError, KbResult};
pub use index::{BatchReport, Indexer};
pub use search::{HybridSearchEngine, SearchHit, SearchRequest};
pub use store::{ChunkFilter, ChunkRecord, ChunkStore, IndexStats, VersionStatus};
pub use version::{VersionDiff, VersionManager};
