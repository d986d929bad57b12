//! End-to-end pipeline test: index, skip, re-index under a new version,
//! and diff the two generations.

use kb_retrieval::{
    ChunkFilter, ChunkStore, ChunkingEngine, EntityDoc, HtpEmbedder, HybridSearchEngine, Indexer,
    SearchRequest, VersionManager,
};

fn requirement_42(description: &str) -> EntityDoc {
    let mut entity = EntityDoc::new("requirement", "42")
        .with_title("GL Account Posting")
        .with_description(description)
        .with_module("FI");
    entity.extra.insert("fit_gap".to_string(), "gap".to_string());
    entity
}

#[test]
fn index_version_diff_scenario() {
    let store = ChunkStore::open_in_memory().unwrap();
    let embedder = HtpEmbedder::new();
    let indexer = Indexer::new(ChunkingEngine::with_defaults(), Some(&embedder), &store);
    let versions = VersionManager::new(&store);

    versions.create("1.0.0").unwrap();

    // First index: one chunk at 1.0.0.
    let entity = requirement_42("Postings must route to the migrated chart of accounts.");
    let written = indexer.index_entity(&entity, "s4-migration", "1.0.0").unwrap();
    assert_eq!(written.len(), 1);
    let hash_v1 = written[0].content_hash.clone().unwrap();
    versions.activate("1.0.0").unwrap();

    // Identical re-index at the same version: zero new rows.
    let rerun = indexer.index_entity(&entity, "s4-migration", "1.0.0").unwrap();
    assert!(rerun.is_empty());

    // Changed description under 2.0.0: new chunk with a new hash, and the
    // 1.0.0 chunk for the entity goes inactive.
    versions.create("2.0.0").unwrap();
    let updated = requirement_42("Postings route to interim accounts until cutover.");
    let written = indexer.index_entity(&updated, "s4-migration", "2.0.0").unwrap();
    assert_eq!(written.len(), 1);
    let hash_v2 = written[0].content_hash.clone().unwrap();
    assert_ne!(hash_v1, hash_v2);

    let old_active = store
        .scan(&ChunkFilter {
            kb_version: Some("1.0.0".to_string()),
            active_only: true,
            ..Default::default()
        })
        .unwrap();
    assert!(old_active.is_empty());

    versions.activate("2.0.0").unwrap();

    // Diff reports the entity as changed.
    let diff = versions.diff("1.0.0", "2.0.0").unwrap();
    assert_eq!(diff.changed, vec![("requirement".to_string(), "42".to_string())]);
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());

    // Search sees only the active generation.
    let engine = HybridSearchEngine::new(&store, Some(&embedder));
    let hits = engine
        .search(&SearchRequest::new("GL account posting cutover"))
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].entity_id, "42");
    assert_eq!(hits[0].kb_version, "2.0.0");
}

#[test]
fn search_is_lexical_only_without_any_embeddings() {
    let store = ChunkStore::open_in_memory().unwrap();
    let indexer = Indexer::new(ChunkingEngine::with_defaults(), None, &store);

    let report = indexer.batch_index(
        &[
            requirement_42("Bank statement import uses format MT940."),
            EntityDoc::new("requirement", "43")
                .with_title("Vendor Invoice Workflow")
                .with_description("Three-way match before payment release."),
        ],
        "s4-migration",
        "1.0.0",
    );
    assert_eq!(report.indexed, 2);

    let engine = HybridSearchEngine::new(&store, None);
    let hits = engine.search(&SearchRequest::new("MT940")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity_id, "42");
    assert!(hits[0].keyword_score > 0.0);
    assert_eq!(hits[0].semantic_score, 0.0);
}
