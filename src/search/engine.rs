//! Hybrid search: cosine similarity + candidate-set BM25, fused by RRF.
//!
//! The whole filtered candidate set is scored in memory per query. That is
//! a deliberate small-corpus simplification; swapping in a real lexical
//! index later must keep the RRF fusion semantics so ranking is unchanged.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::fusion::{fuse, ranks_from_scores};
use super::lexical::Bm25Scorer;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::KbResult;
use crate::store::{ChunkFilter, ChunkRecord, ChunkStore};

/// Search parameters. Filters narrow the candidate set before scoring.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub program: Option<String>,
    pub entity_type: Option<String>,
    pub module: Option<String>,
    pub top_k: usize,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

impl SearchRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            program: None,
            entity_type: None,
            module: None,
            top_k: 10,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

/// One ranked hit. Component scores are kept alongside the fused score so
/// consumers can explain why a result ranked where it did.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub program: String,
    pub chunk_text: String,
    pub kb_version: String,
    pub module: Option<String>,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub combined_score: f32,
}

/// Scores active chunks against a query and returns the fused top-k.
pub struct HybridSearchEngine<'a> {
    store: &'a ChunkStore,
    provider: Option<&'a dyn EmbeddingProvider>,
}

impl<'a> HybridSearchEngine<'a> {
    pub fn new(store: &'a ChunkStore, provider: Option<&'a dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    /// Run one query. An empty candidate set returns an empty list, never
    /// an error; a failing embedding provider degrades to lexical-only.
    pub fn search(&self, request: &SearchRequest) -> KbResult<Vec<SearchHit>> {
        let filter = ChunkFilter {
            program: request.program.clone(),
            entity_type: request.entity_type.clone(),
            module: request.module.clone(),
            active_only: true,
            ..Default::default()
        };
        let candidates = self.store.scan(&filter)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let semantic = self.semantic_scores(&request.query, &candidates);
        let lexical = self.lexical_scores(&request.query, &candidates);

        let combined = fuse(&[
            (request.semantic_weight, ranks_from_scores(&semantic)),
            (request.keyword_weight, ranks_from_scores(&lexical)),
        ]);

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|c| combined.contains_key(&c.id))
            .map(|c| SearchHit {
                semantic_score: semantic.get(&c.id).copied().unwrap_or(0.0),
                keyword_score: lexical.get(&c.id).copied().unwrap_or(0.0),
                combined_score: combined[&c.id],
                chunk_id: c.id,
                entity_type: c.entity_type,
                entity_id: c.entity_id,
                program: c.program,
                chunk_text: c.chunk_text,
                kb_version: c.kb_version,
                module: c.module,
            })
            .collect();

        // Fused score descending; ties break on chunk id ascending so
        // output order is deterministic.
        hits.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(request.top_k);
        Ok(hits)
    }

    /// Cosine similarity per candidate with a stored vector. Candidates
    /// without vectors are absent from the map (not excluded from results;
    /// the lexical ranking can still surface them).
    fn semantic_scores(&self, query: &str, candidates: &[ChunkRecord]) -> HashMap<i64, f32> {
        let Some(provider) = self.provider else {
            return HashMap::new();
        };

        let query_vec = match provider.embed(&[query.to_string()]) {
            Ok(mut vecs) if !vecs.is_empty() => vecs.remove(0),
            Ok(_) => return HashMap::new(),
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "query embedding failed, lexical-only search"
                );
                return HashMap::new();
            }
        };

        let dims = provider.dimensions();
        candidates
            .iter()
            .filter_map(|c| {
                let vec = c.embedding.as_ref()?;
                if vec.len() != dims {
                    warn!(
                        chunk_id = c.id,
                        stored = vec.len(),
                        expected = dims,
                        "stored vector dimension mismatch, scoring lexically only"
                    );
                    return None;
                }
                Some((c.id, cosine_similarity(&query_vec, vec)))
            })
            .collect()
    }

    fn lexical_scores(&self, query: &str, candidates: &[ChunkRecord]) -> HashMap<i64, f32> {
        let scorer =
            Bm25Scorer::build(candidates.iter().map(|c| (c.id, c.chunk_text.clone())));
        scorer.score_all(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingEngine;
    use crate::core::entity::EntityDoc;
    use crate::embedding::HtpEmbedder;
    use crate::index::Indexer;

    fn seeded_store(provider: Option<&dyn EmbeddingProvider>) -> ChunkStore {
        let store = ChunkStore::open_in_memory().unwrap();
        {
            let indexer = Indexer::new(ChunkingEngine::with_defaults(), provider, &store);
            let entities = vec![
                EntityDoc::new("requirement", "1")
                    .with_title("GL Account Posting")
                    .with_description("posting rules for general ledger accounts")
                    .with_module("FI"),
                EntityDoc::new("requirement", "2")
                    .with_title("Material Master")
                    .with_description("material master data creation workflow")
                    .with_module("MM"),
                EntityDoc::new("defect", "3")
                    .with_title("Posting run crash")
                    .with_description("nightly posting run fails with timeout")
                    .with_module("FI"),
            ];
            let report = indexer.batch_index(&entities, "s4", "1.0.0");
            assert_eq!(report.indexed, 3);
        }
        store
    }

    #[test]
    fn empty_candidate_set_returns_empty() {
        let store = ChunkStore::open_in_memory().unwrap();
        let engine = HybridSearchEngine::new(&store, None);
        let hits = engine.search(&SearchRequest::new("anything")).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn lexical_only_fallback_finds_keyword_match() {
        // No provider anywhere: no stored vectors, no query vector.
        let store = seeded_store(None);
        let engine = HybridSearchEngine::new(&store, None);

        let hits = engine
            .search(&SearchRequest::new("material master"))
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entity_id, "2");
        assert_eq!(hits[0].semantic_score, 0.0);
        assert!(hits[0].keyword_score > 0.0);
    }

    #[test]
    fn hybrid_search_exposes_component_scores() {
        let embedder = HtpEmbedder::new();
        let store = seeded_store(Some(&embedder));
        let engine = HybridSearchEngine::new(&store, Some(&embedder));

        let hits = engine
            .search(&SearchRequest::new("general ledger posting rules"))
            .unwrap();
        assert!(!hits.is_empty());
        let top = &hits[0];
        assert_eq!(top.entity_id, "1");
        assert!(top.combined_score > 0.0);
        assert!(top.semantic_score > 0.0);
        assert!(top.keyword_score > 0.0);
    }

    #[test]
    fn filters_narrow_the_candidate_set() {
        let store = seeded_store(None);
        let engine = HybridSearchEngine::new(&store, None);

        let mut request = SearchRequest::new("posting");
        request.entity_type = Some("defect".to_string());
        let hits = engine.search(&request).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.entity_type == "defect"));

        let mut request = SearchRequest::new("posting");
        request.module = Some("MM".to_string());
        let hits = engine.search(&request).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn top_k_truncates_results() {
        let store = seeded_store(None);
        let engine = HybridSearchEngine::new(&store, None);

        let mut request = SearchRequest::new("posting material master data");
        request.top_k = 1;
        let hits = engine.search(&request).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn mismatched_vector_dimensions_fall_back_to_keyword_score() {
        let embedder = HtpEmbedder::new();
        let store = seeded_store(Some(&embedder));

        // Corrupt one stored vector down to a single f32; it must be ignored
        // by the semantic ranking instead of producing a garbage cosine.
        store
            .raw()
            .execute(
                "UPDATE chunks SET embedding = ?1 WHERE entity_id = '1'",
                rusqlite::params![1.0f32.to_le_bytes().to_vec()],
            )
            .unwrap();

        let engine = HybridSearchEngine::new(&store, Some(&embedder));
        let hits = engine
            .search(&SearchRequest::new("general ledger posting rules"))
            .unwrap();

        let hit = hits.iter().find(|h| h.entity_id == "1").unwrap();
        assert_eq!(hit.semantic_score, 0.0);
        assert!(hit.keyword_score > 0.0);
    }

    #[test]
    fn vectorless_rows_still_rank_by_keyword_in_hybrid_mode() {
        // Index without a provider, search with one: the query embeds fine
        // but every row lacks a vector, so only the lexical ranking applies.
        let store = seeded_store(None);
        let embedder = HtpEmbedder::new();
        let engine = HybridSearchEngine::new(&store, Some(&embedder));

        let hits = engine
            .search(&SearchRequest::new("timeout crash"))
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entity_id, "3");
    }
}
