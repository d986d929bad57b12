//! Entity-aware text chunking.
//!
//! Converts one entity into an ordered sequence of overlapping word
//! windows. Window and overlap sizes are configured in token units and
//! converted to approximate word counts with a fixed tokens-per-word ratio;
//! no tokenizer model is loaded.

use crate::core::entity::EntityDoc;
use crate::core::extract::ExtractorRegistry;

/// Approximate tokens per English word for window sizing.
const TOKENS_PER_WORD: f32 = 1.3;

/// Chunk window configuration, in token units.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub window_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: 512,
            overlap_tokens: 64,
        }
    }
}

impl ChunkingConfig {
    fn window_words(&self) -> usize {
        ((self.window_tokens as f32 / TOKENS_PER_WORD) as usize).max(1)
    }

    fn overlap_words(&self) -> usize {
        // Overlap must leave a strictly positive slide step; otherwise the
        // window loop would not terminate.
        let overlap = (self.overlap_tokens as f32 / TOKENS_PER_WORD) as usize;
        overlap.min(self.window_words().saturating_sub(1))
    }
}

/// One chunk of an entity's canonical text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position within the entity.
    pub index: usize,
    pub text: String,
}

/// Splits entities into overlapping chunks via per-type text extractors.
pub struct ChunkingEngine {
    registry: ExtractorRegistry,
    config: ChunkingConfig,
}

impl ChunkingEngine {
    pub fn new(registry: ExtractorRegistry, config: ChunkingConfig) -> Self {
        Self { registry, config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExtractorRegistry::with_defaults(), ChunkingConfig::default())
    }

    /// Canonical text for an entity; the input to both the content hash and
    /// the window splitter.
    pub fn canonical_text(&self, entity: &EntityDoc) -> String {
        self.registry.extract(entity)
    }

    /// Ordered overlapping chunks for one entity. Empty text yields zero
    /// chunks; text within one window yields exactly one.
    pub fn chunk_entity(&self, entity: &EntityDoc) -> Vec<Chunk> {
        let text = self.canonical_text(entity);
        self.split_text(&text)
    }

    fn split_text(&self, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let window = self.config.window_words();
        if words.len() <= window {
            return vec![Chunk {
                index: 0,
                text: words.join(" "),
            }];
        }

        let overlap = self.config.overlap_words();
        let step = window - overlap; // >= 1 by overlap_words clamp

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window).min(words.len());
            chunks.push(Chunk {
                index: chunks.len(),
                text: words[start..end].join(" "),
            });
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for ChunkingEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
