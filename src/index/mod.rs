//! Indexing orchestration: chunking, optional embedding, content-hash
//! change detection, and atomic generation replacement.

use tracing::{debug, warn};

use crate::chunking::ChunkingEngine;
use crate::core::entity::EntityDoc;
use crate::core::hash::content_hash;
use crate::embedding::EmbeddingProvider;
use crate::error::KbResult;
use crate::store::{ChunkRecord, ChunkStore, NewChunk};

/// Per-item failure from a batch run.
#[derive(Debug, serde::Serialize)]
pub struct BatchFailure {
    pub entity_type: String,
    pub entity_id: String,
    pub error: String,
}

/// Aggregate result of `batch_index`. A failed item never aborts the batch.
#[derive(Debug, Default, serde::Serialize)]
pub struct BatchReport {
    /// Entities that produced new chunk rows.
    pub indexed: usize,
    /// Entities skipped because their content hash was unchanged (or their
    /// canonical text was empty).
    pub skipped: usize,
    /// Total chunk rows written across the batch.
    pub chunks_written: usize,
    pub failures: Vec<BatchFailure>,
}

/// Writes entities into the chunk store under versioning rules.
pub struct Indexer<'a> {
    chunker: ChunkingEngine,
    provider: Option<&'a dyn EmbeddingProvider>,
    store: &'a ChunkStore,
}

impl<'a> Indexer<'a> {
    pub fn new(
        chunker: ChunkingEngine,
        provider: Option<&'a dyn EmbeddingProvider>,
        store: &'a ChunkStore,
    ) -> Self {
        Self {
            chunker,
            provider,
            store,
        }
    }

    /// Index one entity at `kb_version`.
    ///
    /// Returns the written chunk records. Two cases write nothing: the
    /// canonical text is unchanged since the active generation, or it is
    /// empty. An entity whose text becomes empty after being indexed keeps
    /// its prior generation active; rows are only deactivated when a new
    /// generation supersedes them. The deactivate-old + insert-new step
    /// commits as a single transaction.
    pub fn index_entity(
        &self,
        entity: &EntityDoc,
        program: &str,
        kb_version: &str,
    ) -> KbResult<Vec<ChunkRecord>> {
        let canonical = self.chunker.canonical_text(entity);
        if canonical.is_empty() {
            debug!(
                entity_type = %entity.entity_type,
                entity_id = %entity.entity_id,
                "empty canonical text, nothing to index"
            );
            return Ok(Vec::new());
        }

        let hash = content_hash(&canonical);
        if self
            .store
            .active_hash(&entity.entity_type, &entity.entity_id)?
            .as_deref()
            == Some(hash.as_str())
        {
            debug!(
                entity_type = %entity.entity_type,
                entity_id = %entity.entity_id,
                "content unchanged, skipping re-index"
            );
            return Ok(Vec::new());
        }

        let chunks = self.chunker.chunk_entity(entity);
        let embeddings = self.embed_chunks(&chunks);

        let new_chunks: Vec<NewChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| NewChunk {
                entity_type: entity.entity_type.clone(),
                entity_id: entity.entity_id.clone(),
                program: program.to_string(),
                chunk_text: chunk.text,
                chunk_index: chunk.index,
                embedding: embeddings.as_ref().map(|vecs| vecs[i].clone()),
                kb_version: kb_version.to_string(),
                content_hash: hash.clone(),
                module: entity.module.clone(),
                phase: entity.phase.clone(),
                metadata: serde_json::json!({}),
            })
            .collect();

        self.store
            .replace_generation(&entity.entity_type, &entity.entity_id, &new_chunks)
    }

    /// Index a batch sequentially, isolating per-item failures.
    pub fn batch_index(
        &self,
        entities: &[EntityDoc],
        program: &str,
        kb_version: &str,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for entity in entities {
            match self.index_entity(entity, program, kb_version) {
                Ok(written) if written.is_empty() => report.skipped += 1,
                Ok(written) => {
                    report.indexed += 1;
                    report.chunks_written += written.len();
                }
                Err(e) => {
                    warn!(
                        entity_type = %entity.entity_type,
                        entity_id = %entity.entity_id,
                        error = %e,
                        "failed to index entity"
                    );
                    report.failures.push(BatchFailure {
                        entity_type: entity.entity_type.clone(),
                        entity_id: entity.entity_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Embed all chunk texts as one provider call. Provider failure
    /// degrades to vector-less rows; search falls back to lexical scoring
    /// for them.
    fn embed_chunks(&self, chunks: &[crate::chunking::Chunk]) -> Option<Vec<Vec<f32>>> {
        let provider = self.provider?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        match provider.embed(&texts) {
            Ok(vecs) if vecs.len() == texts.len() => Some(vecs),
            Ok(_) => {
                warn!(
                    provider = provider.name(),
                    "provider returned wrong vector count, storing null vectors"
                );
                None
            }
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "embedding failed, storing null vectors"
                );
                None
            }
        }
    }
}
